// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Kill-Switch Pipeline: transport-agnostic FSM and replay guard.
//!
//! Concrete transports (stream/SSE, polling, file-watch) require sockets or
//! filesystem access and live in `aigos-std`; this module defines only the
//! `Transport` contract they implement and the state machinery that is
//! common to all of them.

pub mod types;

#[cfg(feature = "std")]
pub mod fsm;
#[cfg(feature = "std")]
pub mod replay;

pub use types::{CommandTarget, KillSwitchCommand, KillSwitchCommandType, RunState, StateTransition};

#[cfg(feature = "std")]
pub use fsm::{KillSwitchHooks, KillSwitchRegistry, NoopHooks};
#[cfg(feature = "std")]
pub use replay::{ReplayConfig, ReplayGuard, ReplayRecord};

/// Connection state reported by a [`Transport`] to `on_connection_change`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// Shared contract implemented by every kill-switch command source.
///
/// Transports are best-effort: the engine never blocks waiting on them, and
/// a transport error surfaces through `on_error` without changing FSM state.
/// Concrete implementations (stream listener, polling listener, file
/// listener) live in `aigos-std` because they require I/O; this trait alone
/// has no I/O and is `no_std`-safe.
pub trait Transport {
    /// Begin receiving commands. Implementations run their own long-lived
    /// task and hand commands to the executor through an in-process queue.
    fn start(&mut self);
    /// Stop receiving commands. Idempotent.
    fn stop(&mut self);
}
