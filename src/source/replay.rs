//! Replay source: feeds recorded events from a newline-delimited JSON file
//! through the same capability a live provider would, with optional pacing.
//! Used by the development binary and as a live-shaped fixture.

use crate::events::LiveEvent;
use crate::source::{ConnectOptions, ConnectTarget, LiveConnection, LiveSource, SourceError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct ReplaySource {
    path: PathBuf,
    delay: Duration,
}

impl ReplaySource {
    pub fn new(path: impl Into<PathBuf>, delay_ms: u64) -> Self {
        Self {
            path: path.into(),
            delay: Duration::from_millis(delay_ms),
        }
    }
}

#[async_trait]
impl LiveSource for ReplaySource {
    async fn connect(
        &self,
        target: &ConnectTarget,
        _options: &ConnectOptions,
    ) -> Result<LiveConnection, SourceError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SourceError::Connection(format!("cannot open {}: {}", self.path.display(), e))
        })?;

        // A replay has no provider to resolve a handle, so the target doubles
        // as the room id.
        let room_id = target.as_str().to_string();
        let delay = self.delay;
        let (tx, rx) = mpsc::channel(256);

        tokio::spawn(async move {
            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let message = serde_json::from_str::<LiveEvent>(line)
                    .map_err(|e| SourceError::Protocol(format!("bad event line: {}", e)));
                let stop = message.is_err();
                if tx.send(message).await.is_err() {
                    // Receiver dropped: connection released
                    return;
                }
                if stop {
                    return;
                }
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        });

        Ok(LiveConnection { room_id, events: rx })
    }
}
