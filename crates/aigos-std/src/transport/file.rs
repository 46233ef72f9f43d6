// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Local-file kill-switch listener.
//!
//! Watches a file for create/modify events via `notify`, debounces bursts
//! of events behind a short deadline, and re-reads + parses the file's
//! contents on each settled change. Falls back to plain polling of the
//! file's mtime when constructing an OS watcher fails (e.g. inotify
//! exhaustion, unsupported filesystem), the same degrade-gracefully
//! posture the kernel's other transports take on transport errors.

use std::path::PathBuf;
use std::time::Duration;

use aigos_core::killswitch::{ConnectionState, Transport};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{forward, ListenerHooks};

const DEBOUNCE: Duration = Duration::from_millis(200);
const FALLBACK_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct FileListenerConfig {
    pub path: PathBuf,
    /// Remove the file after its contents are successfully parsed and
    /// forwarded, so a restart doesn't reprocess the same command.
    pub delete_after_process: bool,
}

pub struct FileListener {
    config: FileListenerConfig,
    command_tx: mpsc::Sender<aigos_core::killswitch::KillSwitchCommand>,
    hooks: ListenerHooks,
    handle: Option<JoinHandle<()>>,
}

impl FileListener {
    pub fn new(
        config: FileListenerConfig,
        command_tx: mpsc::Sender<aigos_core::killswitch::KillSwitchCommand>,
        hooks: ListenerHooks,
    ) -> Self {
        Self { config, command_tx, hooks, handle: None }
    }
}

enum RawEvent {
    Changed,
}

async fn process_file(
    path: &std::path::Path,
    delete_after_process: bool,
    command_tx: &mpsc::Sender<aigos_core::killswitch::KillSwitchCommand>,
    hooks: &ListenerHooks,
) {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(error) => {
            (hooks.on_error)(format!("failed to read kill-switch file: {error}"));
            return;
        }
    };
    if raw.trim().is_empty() {
        return;
    }
    match super::parse_commands(&raw) {
        Ok(commands) => {
            forward(commands, command_tx, hooks).await;
            if delete_after_process {
                if let Err(error) = tokio::fs::remove_file(path).await {
                    warn!(%error, path = %path.display(), "failed to remove processed kill-switch file");
                }
            }
        }
        Err(error) => (hooks.on_error)(format!("malformed kill-switch file: {error}")),
    }
}

async fn run_watched(
    path: PathBuf,
    delete_after_process: bool,
    command_tx: mpsc::Sender<aigos_core::killswitch::KillSwitchCommand>,
    hooks: ListenerHooks,
) {
    let (raw_tx, mut raw_rx) = tokio::sync::mpsc::unbounded_channel::<RawEvent>();
    let watch_path = path.clone();
    let watcher_result = RecommendedWatcher::new(
        move |result: notify::Result<Event>| {
            if let Ok(event) = result {
                if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    let _ = raw_tx.send(RawEvent::Changed);
                }
            }
        },
        notify::Config::default(),
    );

    let mut watcher = match watcher_result {
        Ok(watcher) => watcher,
        Err(error) => {
            warn!(%error, "failed to construct file watcher, falling back to polling");
            (hooks.on_error)(format!("watcher construction failed: {error}"));
            return run_polling(path, delete_after_process, command_tx, hooks).await;
        }
    };

    let watch_dir = watch_path.parent().unwrap_or_else(|| std::path::Path::new("."));
    if let Err(error) = watcher.watch(watch_dir, RecursiveMode::NonRecursive) {
        warn!(%error, "failed to start file watch, falling back to polling");
        (hooks.on_error)(format!("watch start failed: {error}"));
        return run_polling(path, delete_after_process, command_tx, hooks).await;
    }

    (hooks.on_connection_change)(ConnectionState::Connected);
    let mut deadline: Option<Instant> = None;
    loop {
        let sleep = match deadline {
            Some(at) => tokio::time::sleep_until(at),
            None => tokio::time::sleep(Duration::from_secs(3600)),
        };
        tokio::select! {
            maybe_event = raw_rx.recv() => {
                match maybe_event {
                    Some(RawEvent::Changed) => {
                        deadline = Some(Instant::now() + DEBOUNCE);
                    }
                    None => {
                        debug!("file watcher channel closed");
                        return;
                    }
                }
            }
            _ = sleep, if deadline.is_some() => {
                deadline = None;
                process_file(&path, delete_after_process, &command_tx, &hooks).await;
            }
        }
    }
}

async fn run_polling(
    path: PathBuf,
    delete_after_process: bool,
    command_tx: mpsc::Sender<aigos_core::killswitch::KillSwitchCommand>,
    hooks: ListenerHooks,
) {
    let mut last_modified = None;
    let mut ticker = tokio::time::interval(FALLBACK_POLL_INTERVAL);
    loop {
        ticker.tick().await;
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(_) => continue,
        };
        let modified = metadata.modified().ok();
        if modified.is_some() && modified != last_modified {
            last_modified = modified;
            process_file(&path, delete_after_process, &command_tx, &hooks).await;
        }
    }
}

impl Transport for FileListener {
    fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }
        let path = self.config.path.clone();
        let delete_after_process = self.config.delete_after_process;
        let command_tx = self.command_tx.clone();
        let hooks = self.hooks.clone();
        self.handle = Some(tokio::spawn(run_watched(path, delete_after_process, command_tx, hooks)));
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for FileListener {
    fn drop(&mut self) {
        self.stop();
    }
}
