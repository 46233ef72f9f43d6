// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Wire types for kill-switch commands and the FSM they drive.

use alloc::string::String;
use serde::{Deserialize, Serialize};

/// The three kill-switch commands. `TERMINATE` is the only one that moves an
/// instance into the absorbing `TERMINATED` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KillSwitchCommandType {
    Terminate,
    Pause,
    Resume,
}

/// Which scope a command applies to. Instance-scoped always dominates
/// asset-scoped when both are present; neither present is treated as
/// global/organization-scoped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandTarget {
    pub instance_id: Option<String>,
    pub asset_id: Option<String>,
    pub organization: Option<String>,
}

impl CommandTarget {
    pub fn global() -> Self {
        Self { instance_id: None, asset_id: None, organization: None }
    }
}

/// A signed kill-switch directive received from any transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KillSwitchCommand {
    /// Nonce, unique over the replay window.
    pub command_id: String,
    #[serde(rename = "type")]
    pub command_type: KillSwitchCommandType,
    /// Unix epoch milliseconds at which the command was issued.
    pub timestamp: u64,
    pub reason: String,
    #[serde(default = "CommandTarget::global")]
    pub target: CommandTarget,
    pub signature: Option<String>,
}

/// The three-state FSM mandated by the kernel. No other representation
/// (e.g. a boolean pair) is supported; behavior outside these three states
/// is undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    Active,
    Paused,
    Terminated,
}

/// One entry in an instance's bounded state-change history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: RunState,
    pub to: RunState,
    pub command_id: String,
    pub at: u64,
}
