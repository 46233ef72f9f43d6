// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! The kill-switch FSM: `ACTIVE`, `PAUSED`, `TERMINATED`, plus the registry
//! that tracks instance-, asset-, and process-level state and resolves the
//! effective state a policy check observes.
//!
//! Locking follows the kernel's concurrency contract: one mutex per
//! instance's entry, and a single mutex guarding the asset/global maps.
//! `parking_lot` is used throughout, matching the rest of the pack's
//! shared-mutable-state primitives.

#![cfg(feature = "std")]

use alloc::collections::VecDeque;
use alloc::string::{String, ToString};
use hashbrown::HashMap;
use parking_lot::Mutex;

use super::types::{CommandTarget, KillSwitchCommand, KillSwitchCommandType, RunState, StateTransition};

const HISTORY_LIMIT: usize = 100;

/// Pure state transition function. `allow_resume` gates whether a `RESUME`
/// from `PAUSED` is honored; when `false` a resume attempt is a no-op.
fn transition(current: RunState, command: KillSwitchCommandType, allow_resume: bool) -> RunState {
    match (current, command) {
        (RunState::Terminated, _) => RunState::Terminated,
        (_, KillSwitchCommandType::Terminate) => RunState::Terminated,
        (RunState::Active, KillSwitchCommandType::Pause) => RunState::Paused,
        (RunState::Paused, KillSwitchCommandType::Pause) => RunState::Paused,
        (RunState::Paused, KillSwitchCommandType::Resume) if allow_resume => RunState::Active,
        (RunState::Paused, KillSwitchCommandType::Resume) => RunState::Paused,
        (RunState::Active, KillSwitchCommandType::Resume) => RunState::Active,
    }
}

struct Entry {
    state: RunState,
    history: VecDeque<StateTransition>,
}

impl Entry {
    fn new() -> Self {
        Self { state: RunState::Active, history: VecDeque::new() }
    }

    fn push_history(&mut self, from: RunState, to: RunState, command_id: &str, at: u64) {
        if self.history.len() >= HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(StateTransition { from, to, command_id: command_id.to_string(), at });
    }
}

/// Hooks invoked around FSM transitions.
pub trait KillSwitchHooks: Send + Sync {
    /// Runs before a transition into `TERMINATED`. A failure (panic-free —
    /// implementations should return and let the caller decide) is logged
    /// but never aborts the transition.
    fn on_before_terminate(&self, _scope: &str) {}
    /// Runs after the state has moved.
    fn on_state_change(&self, _scope: &str, _from: RunState, _to: RunState) {}
}

/// Default no-op hook set.
pub struct NoopHooks;
impl KillSwitchHooks for NoopHooks {}

/// Tracks instance-, asset-, and process-level kill-switch state and
/// resolves the effective state the policy engine's step-1 gate observes.
pub struct KillSwitchRegistry<H: KillSwitchHooks = NoopHooks> {
    instances: Mutex<HashMap<String, Entry>>,
    assets: Mutex<HashMap<String, Entry>>,
    global: Mutex<Entry>,
    allow_resume: bool,
    hooks: H,
}

impl<H: KillSwitchHooks> KillSwitchRegistry<H> {
    pub fn new(allow_resume: bool, hooks: H) -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
            assets: Mutex::new(HashMap::new()),
            global: Mutex::new(Entry::new()),
            allow_resume,
            hooks,
        }
    }

    /// Resolve the effective run state for `(instance_id, asset_id)`:
    /// instance overrides asset overrides global.
    ///
    /// An entry only ever exists in `instances`/`assets` once a command has
    /// explicitly targeted that scope (`apply_scoped` is the sole inserter),
    /// so presence in the map — not whether the resulting state happens to
    /// differ from `Active` — is what makes a scope dominate. An explicit
    /// instance-level RESUME back to `Active` must still override a paused
    /// asset, the same as an explicit PAUSE would.
    pub fn effective_state(&self, instance_id: &str, asset_id: &str) -> RunState {
        if let Some(state) = self.instances.lock().get(instance_id).map(|e| e.state) {
            return state;
        }
        if let Some(state) = self.assets.lock().get(asset_id).map(|e| e.state) {
            return state;
        }
        self.global.lock().state
    }

    /// Apply an already-replay-checked command at time `now`. Routes to the
    /// instance, asset, or global map per `target`, honoring instance-over-
    /// asset-over-global dominance when more than one scope is present.
    pub fn apply(&self, command: &KillSwitchCommand, now: u64) {
        let KillSwitchCommand { command_id, command_type, target, .. } = command;

        if let Some(instance_id) = &target.instance_id {
            self.apply_scoped(&self.instances, instance_id, *command_type, command_id, now);
            return;
        }
        if let Some(asset_id) = &target.asset_id {
            self.apply_scoped(&self.assets, asset_id, *command_type, command_id, now);
            return;
        }
        self.apply_global(*command_type, command_id, now);
    }

    fn apply_scoped(
        &self,
        map: &Mutex<HashMap<String, Entry>>,
        key: &str,
        command_type: KillSwitchCommandType,
        command_id: &str,
        now: u64,
    ) {
        let mut guard = map.lock();
        let entry = guard.entry(key.into()).or_insert_with(Entry::new);
        let from = entry.state;

        if from == RunState::Terminated {
            if command_type != KillSwitchCommandType::Terminate {
                tracing::warn!(scope = key, ?command_type, "dropped: instance already terminated");
            }
            return;
        }

        if command_type == KillSwitchCommandType::Terminate {
            self.hooks.on_before_terminate(key);
        }

        let to = transition(from, command_type, self.allow_resume);
        entry.state = to;
        entry.push_history(from, to, command_id, now);
        drop(guard);

        if to != from {
            self.hooks.on_state_change(key, from, to);
        }
    }

    fn apply_global(&self, command_type: KillSwitchCommandType, command_id: &str, now: u64) {
        let mut guard = self.global.lock();
        let from = guard.state;

        if from == RunState::Terminated {
            if command_type != KillSwitchCommandType::Terminate {
                tracing::warn!("dropped: global kill-switch already terminated");
            }
            return;
        }

        if command_type == KillSwitchCommandType::Terminate {
            self.hooks.on_before_terminate("__global__");
        }

        let to = transition(from, command_type, self.allow_resume);
        guard.state = to;
        guard.push_history(from, to, command_id, now);
        drop(guard);

        if to != from {
            self.hooks.on_state_change("__global__", from, to);
        }
    }

    /// Bounded history of recent transitions for `instance_id`, most-recent last.
    pub fn history(&self, instance_id: &str) -> alloc::vec::Vec<StateTransition> {
        self.instances
            .lock()
            .get(instance_id)
            .map(|e| e.history.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(id: &str, t: KillSwitchCommandType, target: CommandTarget) -> KillSwitchCommand {
        KillSwitchCommand {
            command_id: id.into(),
            command_type: t,
            timestamp: 0,
            reason: "test".into(),
            target,
            signature: None,
        }
    }

    fn instance_target(id: &str) -> CommandTarget {
        CommandTarget { instance_id: Some(id.into()), asset_id: None, organization: None }
    }

    #[test]
    fn pause_then_resume_round_trips() {
        let reg = KillSwitchRegistry::new(true, NoopHooks);
        reg.apply(&cmd("c1", KillSwitchCommandType::Pause, instance_target("x")), 0);
        assert_eq!(reg.effective_state("x", "asset"), RunState::Paused);
        reg.apply(&cmd("c2", KillSwitchCommandType::Resume, instance_target("x")), 1);
        assert_eq!(reg.effective_state("x", "asset"), RunState::Active);
    }

    #[test]
    fn terminate_is_absorbing() {
        let reg = KillSwitchRegistry::new(true, NoopHooks);
        reg.apply(&cmd("c1", KillSwitchCommandType::Terminate, instance_target("x")), 0);
        reg.apply(&cmd("c2", KillSwitchCommandType::Resume, instance_target("x")), 1);
        assert_eq!(reg.effective_state("x", "asset"), RunState::Terminated);
    }

    #[test]
    fn instance_dominates_asset_dominates_global() {
        let reg = KillSwitchRegistry::new(true, NoopHooks);
        let asset_target = CommandTarget { instance_id: None, asset_id: Some("asset-1".into()), organization: None };
        reg.apply(&cmd("c1", KillSwitchCommandType::Pause, asset_target), 0);
        // instance has no explicit state -> asset-level pause applies.
        assert_eq!(reg.effective_state("inst-1", "asset-1"), RunState::Paused);

        // an explicit instance-level resume dominates the paused asset even
        // though it resolves back to Active -- presence of the instance entry
        // is what grants priority, not which state it happens to hold.
        reg.apply(&cmd("c2", KillSwitchCommandType::Resume, instance_target("inst-1")), 1);
        assert_eq!(reg.effective_state("inst-1", "asset-1"), RunState::Active);
    }

    #[test]
    fn pause_is_idempotent() {
        let reg = KillSwitchRegistry::new(true, NoopHooks);
        reg.apply(&cmd("c1", KillSwitchCommandType::Pause, instance_target("x")), 0);
        reg.apply(&cmd("c2", KillSwitchCommandType::Pause, instance_target("x")), 1);
        assert_eq!(reg.effective_state("x", "asset"), RunState::Paused);
        assert_eq!(reg.history("x").len(), 2);
    }
}
