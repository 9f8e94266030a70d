//! Append-only event log and the aggregation read path.

use crate::events::{EventKind, LiveEvent};
use crate::store::{Db, StoreError, TIMESTAMP_FORMAT};
use chrono::{Local, NaiveDateTime};
use rusqlite::params;

/// One persisted event row, timestamp already parsed for bucketing.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub room_id: String,
    pub kind: EventKind,
    pub timestamp: NaiveDateTime,
    pub payload: serde_json::Value,
}

#[derive(Clone)]
pub struct EventStore {
    db: Db,
}

impl EventStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn log_event(&self, room_id: &str, event: &LiveEvent) -> Result<(), StoreError> {
        self.log_event_at(room_id, event, Local::now().naive_local())
    }

    pub fn log_event_at(
        &self,
        room_id: &str,
        event: &LiveEvent,
        timestamp: NaiveDateTime,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&event.payload()?)?;
        let conn = self.db.lock().unwrap();
        conn.execute(
            "INSERT INTO events (room_id, type, timestamp, payload_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                room_id,
                event.kind().as_str(),
                timestamp.format(TIMESTAMP_FORMAT).to_string(),
                payload,
            ],
        )?;
        Ok(())
    }

    /// Chat and gift events for one room, timestamp ascending. Rows may have
    /// been written by interleaved workers, so ordering happens here rather
    /// than trusting insertion order.
    pub fn events_for_room(&self, room_id: &str) -> Result<Vec<StoredEvent>, StoreError> {
        let conn = self.db.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT type, timestamp, payload_json FROM events
             WHERE room_id = ?1 AND type IN ('chat', 'gift')
             ORDER BY timestamp ASC",
        )?;

        let rows = stmt.query_map(params![room_id], |row| {
            let kind: String = row.get(0)?;
            let timestamp: String = row.get(1)?;
            let payload: String = row.get(2)?;
            Ok((kind, timestamp, payload))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (kind_str, ts_str, payload_str) = row?;
            let kind = EventKind::from_str(&kind_str)
                .ok_or_else(|| StoreError::InvalidRecord(format!("event type '{}'", kind_str)))?;
            let timestamp = NaiveDateTime::parse_from_str(&ts_str, TIMESTAMP_FORMAT)
                .map_err(|e| StoreError::InvalidRecord(format!("timestamp '{}': {}", ts_str, e)))?;
            let payload = serde_json::from_str(&payload_str)?;
            events.push(StoredEvent {
                room_id: room_id.to_string(),
                kind,
                timestamp,
                payload,
            });
        }
        Ok(events)
    }
}
