// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! JSON file persistence for [`aigos_core::killswitch::ReplayGuard`]'s nonce
//! set, so a process restart cannot re-accept a replayed command.
//!
//! Every write flushes atomically (write to `<path>.tmp`, then rename over
//! the target), the same pattern the pack's storage backends use — a crash
//! mid-write never leaves a partial file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aigos_core::killswitch::{ReplayGuard, ReplayRecord};

/// Loads/saves a [`ReplayGuard`] snapshot to a single JSON file.
///
/// Does not own a `ReplayGuard` itself — callers restore an existing guard
/// from [`open`](Self::open) and persist it back out with [`save`](Self::save)
/// on whatever cadence suits them (e.g. after every accepted command, or on
/// a periodic timer).
pub struct FileReplayStore {
    path: PathBuf,
}

impl FileReplayStore {
    /// Read `path` (if it exists) and return the store plus the records it
    /// contained, ready to feed into [`ReplayGuard::restore`]. A missing
    /// file is treated as an empty snapshot, not an error.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<(Self, Vec<ReplayRecord>)> {
        let path = path.as_ref().to_path_buf();
        let records = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw)
                .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, format!("replay snapshot parse error: {error}")))?
        } else {
            Vec::new()
        };
        Ok((Self { path }, records))
    }

    /// Export `guard`'s current snapshot and atomically replace the file.
    pub fn save(&self, guard: &ReplayGuard) -> io::Result<()> {
        let records = guard.snapshot();
        let json = serde_json::to_string_pretty(&records)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, format!("replay snapshot serialise error: {error}")))?;

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Convenience: open the file, restore `guard` from it, and return the
    /// store so the caller can [`save`](Self::save) it later.
    pub fn open_and_restore<P: AsRef<Path>>(path: P, guard: &Arc<ReplayGuard>) -> io::Result<Self> {
        let (store, records) = Self::open(path)?;
        guard.restore(records);
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aigos_core::killswitch::{KillSwitchCommandType, ReplayConfig};

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replay.json");

        let guard = Arc::new(ReplayGuard::new(ReplayConfig::default()));
        guard.check_and_record("a", 1000, KillSwitchCommandType::Pause, 1000).unwrap();
        let store = FileReplayStore::open_and_restore(&path, &guard).unwrap();
        store.save(&guard).unwrap();

        let guard2 = Arc::new(ReplayGuard::new(ReplayConfig::default()));
        let _store2 = FileReplayStore::open_and_restore(&path, &guard2).unwrap();
        let result = guard2.check_and_record("a", 1000, KillSwitchCommandType::Pause, 2000);
        assert!(result.is_err());
    }

    #[test]
    fn missing_file_restores_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        let (_store, records) = FileReplayStore::open(&path).unwrap();
        assert!(records.is_empty());
    }
}
