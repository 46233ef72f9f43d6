// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Command executor: the consumer half of the transport pipeline.
//!
//! A transport (stream/polling/file) only pushes parsed commands into an
//! `mpsc` channel — it never touches the FSM directly. `CommandExecutor` owns
//! the receiving end, drains it, and is the single place a command is
//! admitted to [`KillSwitchRegistry::apply`]: every command passes the
//! replay guard first, so a duplicate or expired/future-timestamped command
//! is rejected before it can ever reach the FSM.

use std::sync::Arc;

use aigos_core::killswitch::{KillSwitchCommand, KillSwitchHooks, KillSwitchRegistry, NoopHooks, ReplayGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Drains a transport's command channel into the replay guard and then the
/// kill-switch registry. One executor per process is typical — every
/// transport a host wires up shares the same `command_tx`/`command_rx` pair
/// feeding it.
pub struct CommandExecutor<H: KillSwitchHooks = NoopHooks> {
    command_rx: mpsc::Receiver<KillSwitchCommand>,
    replay_guard: Arc<ReplayGuard>,
    registry: Arc<KillSwitchRegistry<H>>,
    handle: Option<JoinHandle<()>>,
}

impl<H: KillSwitchHooks + 'static> CommandExecutor<H> {
    pub fn new(
        command_rx: mpsc::Receiver<KillSwitchCommand>,
        replay_guard: Arc<ReplayGuard>,
        registry: Arc<KillSwitchRegistry<H>>,
    ) -> Self {
        Self { command_rx, replay_guard, registry, handle: None }
    }

    /// Process a single command: replay-check, then apply on success. Never
    /// panics on a rejected command — rejection is logged and dropped.
    fn process(replay_guard: &ReplayGuard, registry: &KillSwitchRegistry<H>, command: KillSwitchCommand) {
        let now_ms = crate::now_millis();
        match replay_guard.check_and_record(&command.command_id, command.timestamp, command.command_type, now_ms) {
            Ok(()) => {
                debug!(command_id = %command.command_id, command_type = ?command.command_type, "admitting kill-switch command");
                registry.apply(&command, now_ms);
            }
            Err(error) => {
                warn!(command_id = %command.command_id, %error, "rejected kill-switch command: replay check failed");
            }
        }
    }

    /// Drain every command currently buffered in the channel without
    /// blocking for more. Useful in tests and for a host that wants to pump
    /// the queue on its own schedule instead of spawning a background task.
    pub fn drain_available(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            Self::process(&self.replay_guard, &self.registry, command);
        }
    }

    /// Spawn the long-lived consumer task. Ends when every `command_tx`
    /// clone is dropped and the channel closes.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }
        let mut command_rx = std::mem::replace(&mut self.command_rx, mpsc::channel(1).1);
        let replay_guard = self.replay_guard.clone();
        let registry = self.registry.clone();

        self.handle = Some(tokio::spawn(async move {
            while let Some(command) = command_rx.recv().await {
                Self::process(&replay_guard, &registry, command);
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl<H: KillSwitchHooks> Drop for CommandExecutor<H> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
