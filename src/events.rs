//! Typed live-stream events and the notifications pushed to subscribers.
//!
//! The external source delivers a closed set of event variants; dispatch is a
//! match over the tag, and the same structs are reused for the wire payloads
//! (camelCase) and for the persisted `payload_json` column.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Chat,
    Gift,
    Like,
    Join,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Chat => "chat",
            EventKind::Gift => "gift",
            EventKind::Like => "like",
            EventKind::Join => "join",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "chat" => Some(EventKind::Chat),
            "gift" => Some(EventKind::Gift),
            "like" => Some(EventKind::Like),
            "join" => Some(EventKind::Join),
            _ => None,
        }
    }

    /// Join events are forwarded to subscribers but never written to storage.
    pub fn is_persisted(&self) -> bool {
        !matches!(self, EventKind::Join)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub unique_id: String,
    pub nickname: String,
    pub comment: String,
    pub user_id: u64,
    pub region: String,
}

fn default_repeat_count() -> i64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftPayload {
    pub unique_id: String,
    pub nickname: String,
    pub user_id: u64,
    pub region: String,
    pub gift_id: i64,
    pub gift_name: String,
    /// Streak length; sources that send one event per gift omit it.
    #[serde(default = "default_repeat_count")]
    pub repeat_count: i64,
    pub gift_type: i64,
    pub diamond_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikePayload {
    pub unique_id: String,
    pub nickname: String,
    pub user_id: u64,
    pub like_count: i64,
    pub total_like_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub unique_id: String,
    pub nickname: String,
}

/// One event received from an external live-stream connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LiveEvent {
    Chat(ChatPayload),
    Gift(GiftPayload),
    Like(LikePayload),
    Join(JoinPayload),
}

impl LiveEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LiveEvent::Chat(_) => EventKind::Chat,
            LiveEvent::Gift(_) => EventKind::Gift,
            LiveEvent::Like(_) => EventKind::Like,
            LiveEvent::Join(_) => EventKind::Join,
        }
    }

    /// Payload without the type tag, as stored in the `payload_json` column.
    pub fn payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            LiveEvent::Chat(p) => serde_json::to_value(p),
            LiveEvent::Gift(p) => serde_json::to_value(p),
            LiveEvent::Like(p) => serde_json::to_value(p),
            LiveEvent::Join(p) => serde_json::to_value(p),
        }
    }
}

/// Outbound message to one subscriber. Join events surface as `member`
/// notifications on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Notification {
    Connected {
        #[serde(rename = "currentState")]
        current_state: String,
    },
    Disconnected {
        reason: String,
    },
    Chat(ChatPayload),
    Gift(GiftPayload),
    Like(LikePayload),
    Member(JoinPayload),
}

impl Notification {
    pub fn connected() -> Self {
        Notification::Connected {
            current_state: "CONNECTED".to_string(),
        }
    }

    pub fn disconnected(reason: impl Into<String>) -> Self {
        Notification::Disconnected {
            reason: reason.into(),
        }
    }
}

impl From<LiveEvent> for Notification {
    fn from(event: LiveEvent) -> Self {
        match event {
            LiveEvent::Chat(p) => Notification::Chat(p),
            LiveEvent::Gift(p) => Notification::Gift(p),
            LiveEvent::Like(p) => Notification::Like(p),
            LiveEvent::Join(p) => Notification::Member(p),
        }
    }
}
