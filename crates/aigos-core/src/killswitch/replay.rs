// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Replay prevention for kill-switch commands.
//!
//! A process-wide guard tracks accepted `command_id`s with their timestamp
//! and type. Transport-agnostic — every listener feeds commands through the
//! same guard before the FSM ever sees them. Optional disk persistence
//! (so a restart cannot re-accept a replayed command) lives in `aigos-std`,
//! which reads/writes the snapshot this module exposes.

#![cfg(feature = "std")]

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::error::ReplayError;

/// One accepted command, as tracked by the guard — also the on-disk record
/// shape used by `aigos-std`'s persisted replay store.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ReplayRecord {
    pub command_id: String,
    pub timestamp: u64,
    pub command_type: super::types::KillSwitchCommandType,
}

#[derive(Debug, Clone, Copy)]
pub struct ReplayConfig {
    pub max_command_age_s: u64,
    pub max_nonce_cache: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self { max_command_age_s: 300, max_nonce_cache: 10_000 }
    }
}

struct Tracked {
    timestamp: u64,
    command_type: super::types::KillSwitchCommandType,
    /// Insertion order, used to prune the oldest 10% when the cache is full.
    seq: u64,
}

/// Guards kill-switch command acceptance against replay.
///
/// One mutex around the nonce set and its bounded queue; the periodic
/// pruner runs under the same lock in short critical sections, per the
/// kernel's concurrency contract.
pub struct ReplayGuard {
    config: ReplayConfig,
    seen: Mutex<HashMap<String, Tracked>>,
    next_seq: core::sync::atomic::AtomicU64,
}

impl ReplayGuard {
    pub fn new(config: ReplayConfig) -> Self {
        Self {
            config,
            seen: Mutex::new(HashMap::new()),
            next_seq: core::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Seed the guard from a persisted snapshot (e.g. loaded at startup by
    /// `aigos-std::FileReplayStore::open`).
    pub fn restore(&self, records: Vec<ReplayRecord>) {
        let mut guard = self.seen.lock();
        for record in records {
            let seq = self.next_seq.fetch_add(1, core::sync::atomic::Ordering::Relaxed);
            guard.insert(record.command_id, Tracked { timestamp: record.timestamp, command_type: record.command_type, seq });
        }
    }

    /// Export the current snapshot for persistence.
    pub fn snapshot(&self) -> Vec<ReplayRecord> {
        self.seen
            .lock()
            .iter()
            .map(|(id, t)| ReplayRecord { command_id: id.clone(), timestamp: t.timestamp, command_type: t.command_type })
            .collect()
    }

    /// Validate and, if accepted, record `command_id`/`timestamp`/`command_type`.
    ///
    /// Rejects when the timestamp is in the future (any skew), older than
    /// `max_command_age_s`, or the `command_id` was already recorded.
    pub fn check_and_record(
        &self,
        command_id: &str,
        timestamp_ms: u64,
        command_type: super::types::KillSwitchCommandType,
        now_ms: u64,
    ) -> Result<(), ReplayError> {
        if timestamp_ms > now_ms {
            tracing::error!(command_id, timestamp_ms, now_ms, "rejected kill-switch command: timestamp in the future");
            return Err(ReplayError::Future { timestamp: timestamp_ms, now: now_ms });
        }
        let max_age_ms = self.config.max_command_age_s.saturating_mul(1000);
        if now_ms.saturating_sub(timestamp_ms) > max_age_ms {
            tracing::error!(command_id, timestamp_ms, now_ms, "rejected kill-switch command: timestamp expired");
            return Err(ReplayError::Expired { timestamp: timestamp_ms, max_age_s: self.config.max_command_age_s });
        }

        let mut guard = self.seen.lock();
        if guard.contains_key(command_id) {
            tracing::error!(command_id, "rejected kill-switch command: replayed command_id");
            return Err(ReplayError::Duplicate(command_id.to_string()));
        }

        self.prune_locked(&mut guard, now_ms);

        let seq = self.next_seq.fetch_add(1, core::sync::atomic::Ordering::Relaxed);
        guard.insert(command_id.to_string(), Tracked { timestamp: timestamp_ms, command_type, seq });
        Ok(())
    }

    /// Purge entries older than `2 * max_command_age_s`, then, if still over
    /// capacity, evict the oldest 10% by insertion order.
    fn prune_locked(&self, guard: &mut HashMap<String, Tracked>, now_ms: u64) {
        let purge_age_ms = self.config.max_command_age_s.saturating_mul(2).saturating_mul(1000);
        guard.retain(|_, t| now_ms.saturating_sub(t.timestamp) <= purge_age_ms);

        if guard.len() >= self.config.max_nonce_cache {
            let evict_count = (guard.len() / 10).max(1);
            let mut by_seq: Vec<(String, u64)> = guard.iter().map(|(k, t)| (k.clone(), t.seq)).collect();
            by_seq.sort_by_key(|(_, seq)| *seq);
            for (id, _) in by_seq.into_iter().take(evict_count) {
                guard.remove(&id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::types::KillSwitchCommandType;

    #[test]
    fn accepts_fresh_command() {
        let guard = ReplayGuard::new(ReplayConfig::default());
        assert!(guard.check_and_record("a", 1000, KillSwitchCommandType::Pause, 1000).is_ok());
    }

    #[test]
    fn rejects_duplicate() {
        let guard = ReplayGuard::new(ReplayConfig::default());
        guard.check_and_record("a", 1000, KillSwitchCommandType::Pause, 1000).unwrap();
        let result = guard.check_and_record("a", 1000, KillSwitchCommandType::Pause, 2000);
        assert!(matches!(result, Err(ReplayError::Duplicate(_))));
    }

    #[test]
    fn rejects_future_timestamp() {
        let guard = ReplayGuard::new(ReplayConfig::default());
        let result = guard.check_and_record("a", 5000, KillSwitchCommandType::Pause, 1000);
        assert!(matches!(result, Err(ReplayError::Future { .. })));
    }

    #[test]
    fn rejects_stale_timestamp() {
        let guard = ReplayGuard::new(ReplayConfig { max_command_age_s: 300, max_nonce_cache: 10_000 });
        let result = guard.check_and_record("a", 0, KillSwitchCommandType::Pause, 400_000);
        assert!(matches!(result, Err(ReplayError::Expired { .. })));
    }

    #[test]
    fn prunes_oldest_ten_percent_when_full() {
        let guard = ReplayGuard::new(ReplayConfig { max_command_age_s: 300, max_nonce_cache: 10 });
        for i in 0..10 {
            let id = i.to_string();
            guard.check_and_record(&id, 0, KillSwitchCommandType::Pause, 0).unwrap();
        }
        assert!(guard.len() <= 10);
    }
}
