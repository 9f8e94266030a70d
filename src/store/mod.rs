//! SQLite persistence for rooms, sessions, and the event log.
//!
//! One connection behind a mutex, shared by every store. Timestamps are
//! naive local datetime text so rows sort chronologically as plain strings.

pub mod event_log;
pub mod rooms;
pub mod sessions;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub use event_log::{EventStore, StoredEvent};
pub use rooms::{Room, RoomStore};
pub use sessions::{SessionRegistry, SessionSummary};

pub type Db = Arc<Mutex<Connection>>;

pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug)]
pub enum StoreError {
    Database(rusqlite::Error),
    Serialization(serde_json::Error),
    InvalidRecord(String),
    SequenceExhausted(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {}", e),
            StoreError::Serialization(e) => write!(f, "Serialization error: {}", e),
            StoreError::InvalidRecord(msg) => write!(f, "Invalid record: {}", msg),
            StoreError::SequenceExhausted(day) => {
                write!(f, "Session sequence exhausted for {}", day)
            }
        }
    }
}

impl std::error::Error for StoreError {}

const SCHEMA: &str = r"CREATE TABLE IF NOT EXISTS rooms (
    room_id TEXT PRIMARY KEY,
    name TEXT,
    address TEXT,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    room_id TEXT NOT NULL,
    snapshot_json TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessions_room_created ON sessions (room_id, created_at DESC);
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    room_id TEXT NOT NULL,
    type TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    payload_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_events_room_time ON events (room_id, timestamp);";

/// Open (or create) the database, enable WAL, and apply the schema.
pub fn open_database(path: impl AsRef<Path>) -> Result<Db, StoreError> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.execute_batch(SCHEMA)?;
    log::info!("✅ SQLite database initialized with WAL mode");
    Ok(Arc::new(Mutex::new(conn)))
}

#[cfg(test)]
pub(crate) fn open_test_database() -> Db {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    Arc::new(Mutex::new(conn))
}
