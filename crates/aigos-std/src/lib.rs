// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! # aigos-std
//!
//! `std`-only kill-switch transports and replay persistence that sit on top
//! of `aigos-core`'s `no_std` FSM and policy engine.
//!
//! `aigos-core` defines the [`aigos_core::killswitch::Transport`] contract
//! and the pure state machinery; this crate supplies the parts that need a
//! runtime and I/O:
//!
//! - [`transport::stream::StreamListener`] — long-lived SSE-style listener.
//! - [`transport::polling::PollingListener`] — periodic HTTP poll.
//! - [`transport::file::FileListener`] — local file watch (falls back to
//!   polling if the OS watcher can't be constructed).
//! - [`persistence::FileReplayStore`] — durable replay-guard snapshots.
//! - [`executor::CommandExecutor`] — drains a transport's channel through the
//!   replay guard and into the registry; the piece that turns a parsed
//!   command into an FSM transition.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use aigos_core::killswitch::{KillSwitchRegistry, NoopHooks, ReplayConfig, ReplayGuard};
//! use aigos_std::executor::CommandExecutor;
//! use aigos_std::persistence::FileReplayStore;
//! use aigos_std::transport::polling::{PollingListener, PollingListenerConfig};
//! use aigos_std::transport::ListenerHooks;
//!
//! # async fn run() -> std::io::Result<()> {
//! let replay_guard = Arc::new(ReplayGuard::new(ReplayConfig::default()));
//! let _store = FileReplayStore::open_and_restore("/var/lib/aigos/replay.json", &replay_guard)?;
//!
//! let registry = Arc::new(KillSwitchRegistry::new(true, NoopHooks));
//! let (command_tx, command_rx) = tokio::sync::mpsc::channel(64);
//!
//! let config = PollingListenerConfig::new("https://control.example/kill-switch", "inst-1", "asset-1");
//! let client = reqwest::Client::new();
//! let mut listener = PollingListener::new(config, client, command_tx, ListenerHooks::noop());
//! aigos_core::killswitch::Transport::start(&mut listener);
//!
//! // The executor is the only caller of `registry.apply` — every command a
//! // transport hands over is replay-checked before the FSM ever sees it.
//! let mut executor = CommandExecutor::new(command_rx, replay_guard, registry);
//! executor.start();
//! # Ok(())
//! # }
//! ```

use chrono::TimeZone;

pub mod executor;
pub mod persistence;
pub mod transport;

pub use executor::CommandExecutor;
pub use persistence::FileReplayStore;

/// Current Unix epoch time in milliseconds, the unit the FSM and internal
/// bookkeeping use throughout. The wire protocol itself uses ISO8601 (see
/// [`to_rfc3339_millis`]) — this is the internal representation only.
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

/// Renders a Unix epoch-millisecond instant as the RFC3339/ISO8601 string
/// the wire protocol expects (e.g. `last_poll` in the polling transport).
/// Falls back to the Unix epoch itself if `millis` is out of chrono's
/// representable range.
pub(crate) fn to_rfc3339_millis(millis: u64) -> String {
    chrono::Utc
        .timestamp_millis_opt(millis as i64)
        .single()
        .unwrap_or_else(|| chrono::DateTime::<chrono::Utc>::UNIX_EPOCH)
        .to_rfc3339()
}
