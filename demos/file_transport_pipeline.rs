// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! # File Transport Pipeline Walkthrough
//!
//! Exercises the full command path: file transport -> replay guard ->
//! command executor -> kill-switch FSM. Writes a PAUSE command to a temp
//! file, lets the file-watch listener pick it up, and confirms the FSM
//! moves to PAUSED. Then replays the same command file and confirms the
//! executor rejects it as a duplicate and the FSM state does not change.
//!
//! ```bash
//! cargo run -p aigos-std --example file_transport_pipeline
//! ```

use std::sync::Arc;
use std::time::Duration;

use aigos_core::killswitch::{KillSwitchRegistry, NoopHooks, ReplayConfig, ReplayGuard, RunState, Transport};
use aigos_std::executor::CommandExecutor;
use aigos_std::transport::file::{FileListener, FileListenerConfig};
use aigos_std::transport::ListenerHooks;

#[tokio::main]
async fn main() {
    let path = std::env::temp_dir().join("aigos-demo-kill-switch.json");

    let registry = Arc::new(KillSwitchRegistry::new(true, NoopHooks));
    let replay_guard = Arc::new(ReplayGuard::new(ReplayConfig::default()));
    let (command_tx, command_rx) = tokio::sync::mpsc::channel(16);

    let mut executor = CommandExecutor::new(command_rx, replay_guard, registry.clone());
    executor.start();

    let mut listener = FileListener::new(
        FileListenerConfig { path: path.clone(), delete_after_process: false },
        command_tx,
        ListenerHooks::noop(),
    );
    listener.start();

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as u64;
    let command = format!(
        r#"{{"command_id":"demo-cmd-1","type":"PAUSE","timestamp":{now},"reason":"manual review","target":{{"instance_id":"inst-1","asset_id":null,"organization":null}}}}"#
    );
    tokio::fs::write(&path, &command).await.expect("write kill-switch file");

    tokio::time::sleep(Duration::from_millis(500)).await;
    println!(
        "after first write -> effective_state(inst-1) = {:?}",
        registry.effective_state("inst-1", "asset-1")
    );
    assert_eq!(registry.effective_state("inst-1", "asset-1"), RunState::Paused);

    // Rewrite the identical command (same command_id, same timestamp) to
    // trigger the watcher again. The replay guard must reject it before the
    // registry ever sees it; FSM state is unchanged.
    tokio::fs::write(&path, &command).await.expect("rewrite kill-switch file");
    tokio::time::sleep(Duration::from_millis(500)).await;
    println!(
        "after replayed write -> effective_state(inst-1) = {:?} (must stay PAUSED, not re-applied)",
        registry.effective_state("inst-1", "asset-1")
    );
    assert_eq!(registry.effective_state("inst-1", "asset-1"), RunState::Paused);

    listener.stop();
    executor.stop();
    println!("\nDone.");
}
