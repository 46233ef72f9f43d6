// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Long-lived SSE-style stream listener.
//!
//! Reads `data: {json-command}\n\n` frames off a chunked HTTP response,
//! treating any non-command frame as a heartbeat. Reconnects on stream end
//! or transport error with exponential backoff capped at 30s.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use aigos_core::killswitch::{ConnectionState, Transport};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{forward, ListenerHooks};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(45);

pub struct StreamListenerConfig {
    pub url: String,
    pub bearer_token: Option<String>,
}

/// Reconnecting SSE listener. `start` spawns a background task that owns
/// the HTTP connection; `stop` aborts it. Like the other transports it
/// never blocks the caller — all I/O happens on the spawned task.
pub struct StreamListener {
    config: StreamListenerConfig,
    client: reqwest::Client,
    command_tx: mpsc::Sender<aigos_core::killswitch::KillSwitchCommand>,
    hooks: ListenerHooks,
    handle: Option<JoinHandle<()>>,
}

impl StreamListener {
    pub fn new(
        config: StreamListenerConfig,
        client: reqwest::Client,
        command_tx: mpsc::Sender<aigos_core::killswitch::KillSwitchCommand>,
        hooks: ListenerHooks,
    ) -> Self {
        Self { config, client, command_tx, hooks, handle: None }
    }

    fn run(&self) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        let url = self.config.url.clone();
        let bearer = self.config.bearer_token.clone();
        let client = self.client.clone();
        let command_tx = self.command_tx.clone();
        let hooks = self.hooks.clone();
        Box::pin(async move {
            let mut backoff = INITIAL_BACKOFF;
            loop {
                match connect_and_drain(&client, &url, bearer.as_deref(), &command_tx, &hooks).await {
                    Ok(()) => {
                        debug!(%url, "stream ended cleanly, reconnecting");
                        backoff = INITIAL_BACKOFF;
                    }
                    Err(error) => {
                        warn!(%url, %error, "stream listener error, backing off");
                        (hooks.on_error)(error);
                    }
                }
                (hooks.on_connection_change)(ConnectionState::Disconnected);
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        })
    }
}

async fn connect_and_drain(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    command_tx: &mpsc::Sender<aigos_core::killswitch::KillSwitchCommand>,
    hooks: &ListenerHooks,
) -> Result<(), String> {
    let mut request = client.get(url).header("Accept", "text/event-stream");
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }
    let response = request.send().await.map_err(|error| error.to_string())?;
    if !response.status().is_success() {
        return Err(format!("stream endpoint returned {}", response.status()));
    }
    (hooks.on_connection_change)(ConnectionState::Connected);

    let mut byte_stream = response.bytes_stream();
    let mut buffer = String::new();
    loop {
        let chunk = match tokio::time::timeout(HEARTBEAT_TIMEOUT, byte_stream.next()).await {
            Ok(Some(Ok(bytes))) => bytes,
            Ok(Some(Err(error))) => return Err(error.to_string()),
            Ok(None) => return Ok(()),
            Err(_) => return Err("no heartbeat within timeout".to_string()),
        };
        buffer.push_str(&String::from_utf8_lossy(&chunk));
        while let Some(frame_end) = buffer.find("\n\n") {
            let frame = buffer[..frame_end].to_string();
            buffer.drain(..frame_end + 2);
            if let Some(data) = extract_data_field(&frame) {
                if data.trim().is_empty() {
                    continue;
                }
                match super::parse_commands(&data) {
                    Ok(commands) => forward(commands, command_tx, hooks).await,
                    Err(error) => (hooks.on_error)(format!("malformed stream frame: {error}")),
                }
            }
        }
    }
}

fn extract_data_field(frame: &str) -> Option<String> {
    let mut data_lines = Vec::new();
    for line in frame.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim_start());
        }
    }
    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

impl Transport for StreamListener {
    fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }
        self.handle = Some(tokio::spawn(self.run()));
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for StreamListener {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_single_line_data_field() {
        let frame = "event: command\ndata: {\"foo\":1}";
        assert_eq!(extract_data_field(frame).as_deref(), Some("{\"foo\":1}"));
    }

    #[test]
    fn heartbeat_frame_has_no_data() {
        let frame = ": keep-alive";
        assert_eq!(extract_data_field(frame), None);
    }
}
