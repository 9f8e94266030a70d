//! The external live-stream connection capability.
//!
//! Providers are opaque behind [`LiveSource`]: connect to a target, get back
//! the resolved room id plus a channel of typed events, release the
//! connection by dropping the receiver. Wire-protocol details stay on the
//! other side of this seam.

pub mod replay;

use crate::events::LiveEvent;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Connection options forwarded to the provider verbatim, minus the
/// extended-gift-info flag which is stripped before the capability sees it.
const EXTENDED_GIFT_INFO_KEY: &str = "enableExtendedGiftInfo";

/// What a subscriber asked to observe. An all-digits target is a room
/// identifier rather than a user handle; that is a connect-mode fork, not an
/// error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    RoomId(String),
    Username(String),
}

impl ConnectTarget {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.chars().all(|c| c.is_ascii_digit()) {
            Some(ConnectTarget::RoomId(trimmed.to_string()))
        } else {
            Some(ConnectTarget::Username(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ConnectTarget::RoomId(id) => id,
            ConnectTarget::Username(name) => name,
        }
    }
}

impl std::fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectTarget::RoomId(id) => write!(f, "room:{}", id),
            ConnectTarget::Username(name) => write!(f, "user:{}", name),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    entries: HashMap<String, Value>,
}

impl From<HashMap<String, Value>> for ConnectOptions {
    fn from(entries: HashMap<String, Value>) -> Self {
        Self { entries }
    }
}

impl ConnectOptions {
    /// Copy with the extended-info flag removed; built by the worker right
    /// before the provider sees the options.
    pub fn sanitized(&self) -> ConnectOptions {
        let mut entries = self.entries.clone();
        entries.remove(EXTENDED_GIFT_INFO_KEY);
        ConnectOptions { entries }
    }

    pub fn entries(&self) -> &HashMap<String, Value> {
        &self.entries
    }
}

#[derive(Debug)]
pub enum SourceError {
    Connection(String),
    Protocol(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Connection(msg) => write!(f, "Connection error: {}", msg),
            SourceError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

/// An established connection: the provider-resolved room id and the event
/// stream. Dropping `events` releases the connection.
pub struct LiveConnection {
    pub room_id: String,
    pub events: mpsc::Receiver<Result<LiveEvent, SourceError>>,
}

#[async_trait]
pub trait LiveSource: Send + Sync {
    async fn connect(
        &self,
        target: &ConnectTarget,
        options: &ConnectOptions,
    ) -> Result<LiveConnection, SourceError>;
}
