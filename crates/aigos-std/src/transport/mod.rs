// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Concrete kill-switch transports: stream (SSE), polling, and file-watch.
//!
//! All three implement [`aigos_core::killswitch::Transport`] (start/stop,
//! no I/O in the trait itself) and hand parsed commands to the executor
//! through an in-process `tokio::mpsc` channel, matching the kernel's
//! message-passing concurrency model. Listeners are best-effort: a
//! transport error is reported through `on_error` and never blocks or
//! panics the caller.

pub mod file;
pub mod polling;
pub mod stream;

use std::sync::Arc;

use aigos_core::killswitch::{ConnectionState, KillSwitchCommand, KillSwitchCommandType};
use serde::Deserialize;
use tokio::sync::mpsc;

pub use aigos_core::killswitch::KillSwitchCommand as Command;

/// Callbacks a listener reports through. Cloned cheaply (`Arc` inside) so
/// the same set can be shared across the stream/polling/file listeners a
/// host wires up together.
#[derive(Clone)]
pub struct ListenerHooks {
    pub on_error: Arc<dyn Fn(String) + Send + Sync>,
    pub on_connection_change: Arc<dyn Fn(ConnectionState) + Send + Sync>,
}

impl ListenerHooks {
    pub fn noop() -> Self {
        Self { on_error: Arc::new(|_| {}), on_connection_change: Arc::new(|_| {}) }
    }
}

/// Recognized JSON shapes a transport's payload may arrive in: a single
/// command, a bare array, or `{command: ..}` / `{commands: [..]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CommandPayload {
    Single(KillSwitchCommand),
    Many(Vec<KillSwitchCommand>),
    Wrapped { command: Option<KillSwitchCommand>, commands: Option<Vec<KillSwitchCommand>> },
}

impl CommandPayload {
    pub fn into_commands(self) -> Vec<KillSwitchCommand> {
        match self {
            CommandPayload::Single(cmd) => vec![cmd],
            CommandPayload::Many(cmds) => cmds,
            CommandPayload::Wrapped { command, commands } => {
                let mut out = commands.unwrap_or_default();
                if let Some(cmd) = command {
                    out.push(cmd);
                }
                out
            }
        }
    }
}

/// Parse a raw JSON payload into zero or more commands, per the recognized
/// wire shapes (single object, array, `{command}`, `{commands}`).
pub fn parse_commands(raw: &str) -> Result<Vec<KillSwitchCommand>, serde_json::Error> {
    serde_json::from_str::<CommandPayload>(raw).map(CommandPayload::into_commands)
}

/// Send `commands` into the executor channel, dropping (and reporting via
/// `hooks`) any that fail to send because the receiver was closed.
pub(crate) async fn forward(commands: Vec<KillSwitchCommand>, tx: &mpsc::Sender<Command>, hooks: &ListenerHooks) {
    for command in commands {
        if tx.send(command).await.is_err() {
            (hooks.on_error)("executor channel closed".to_string());
            return;
        }
    }
}

/// Whether a parsed command type is one the FSM understands — used by
/// transports that want to log unexpected types before forwarding.
pub fn is_known_command(command_type: KillSwitchCommandType) -> bool {
    matches!(command_type, KillSwitchCommandType::Terminate | KillSwitchCommandType::Pause | KillSwitchCommandType::Resume)
}
