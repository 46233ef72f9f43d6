// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Periodic HTTP polling listener.
//!
//! Issues a GET with `last_poll`/`instance_id`/`asset_id` query parameters
//! on a fixed interval (default 30s) and parses the `{commands: [...]}` or
//! bare-array response. Marks the connection disconnected after a
//! configurable run of consecutive errors (default 5) but keeps polling —
//! the endpoint coming back is itself the reconnect.

use std::time::Duration;

use aigos_core::killswitch::ConnectionState;
use aigos_core::killswitch::Transport;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use super::{forward, ListenerHooks};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_ERROR_THRESHOLD: u32 = 5;

pub struct PollingListenerConfig {
    pub url: String,
    pub instance_id: String,
    pub asset_id: String,
    pub interval: Duration,
    pub consecutive_error_threshold: u32,
}

impl PollingListenerConfig {
    pub fn new(url: impl Into<String>, instance_id: impl Into<String>, asset_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            instance_id: instance_id.into(),
            asset_id: asset_id.into(),
            interval: DEFAULT_INTERVAL,
            consecutive_error_threshold: DEFAULT_ERROR_THRESHOLD,
        }
    }
}

pub struct PollingListener {
    config: PollingListenerConfig,
    client: reqwest::Client,
    command_tx: mpsc::Sender<aigos_core::killswitch::KillSwitchCommand>,
    hooks: ListenerHooks,
    handle: Option<JoinHandle<()>>,
}

impl PollingListener {
    pub fn new(
        config: PollingListenerConfig,
        client: reqwest::Client,
        command_tx: mpsc::Sender<aigos_core::killswitch::KillSwitchCommand>,
        hooks: ListenerHooks,
    ) -> Self {
        Self { config, client, command_tx, hooks, handle: None }
    }
}

async fn poll_once(
    client: &reqwest::Client,
    url: &str,
    instance_id: &str,
    asset_id: &str,
    last_poll: u64,
) -> Result<Vec<aigos_core::killswitch::KillSwitchCommand>, String> {
    let response = client
        .get(url)
        .query(&[
            ("last_poll", crate::to_rfc3339_millis(last_poll)),
            ("instance_id", instance_id.to_string()),
            ("asset_id", asset_id.to_string()),
        ])
        .send()
        .await
        .map_err(|error| error.to_string())?;

    if !response.status().is_success() {
        return Err(format!("poll endpoint returned {}", response.status()));
    }
    let body = response.text().await.map_err(|error| error.to_string())?;
    super::parse_commands(&body).map_err(|error| error.to_string())
}

impl Transport for PollingListener {
    fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }
        let url = self.config.url.clone();
        let instance_id = self.config.instance_id.clone();
        let asset_id = self.config.asset_id.clone();
        let interval = self.config.interval;
        let threshold = self.config.consecutive_error_threshold;
        let client = self.client.clone();
        let command_tx = self.command_tx.clone();
        let hooks = self.hooks.clone();

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut last_poll: u64 = 0;
            let mut consecutive_errors: u32 = 0;
            let mut connected = false;

            loop {
                ticker.tick().await;
                let now = crate::now_millis();
                match poll_once(&client, &url, &instance_id, &asset_id, last_poll).await {
                    Ok(commands) => {
                        if !connected {
                            connected = true;
                            (hooks.on_connection_change)(ConnectionState::Connected);
                        }
                        consecutive_errors = 0;
                        last_poll = now;
                        forward(commands, &command_tx, &hooks).await;
                    }
                    Err(error) => {
                        consecutive_errors += 1;
                        warn!(%error, consecutive_errors, "poll failed");
                        (hooks.on_error)(error);
                        if consecutive_errors >= threshold && connected {
                            connected = false;
                            (hooks.on_connection_change)(ConnectionState::Disconnected);
                        }
                    }
                }
            }
        }));
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for PollingListener {
    fn drop(&mut self) {
        self.stop();
    }
}
