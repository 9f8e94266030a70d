//! Session snapshots with human-readable per-day sequential ids.

use crate::store::{Db, StoreError, TIMESTAMP_FORMAT};
use chrono::{Local, NaiveDateTime};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

/// Highest sequence number a day can hold with a 2-digit suffix.
const MAX_DAY_SEQUENCE: i64 = 99;

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub room_id: String,
    pub created_at: String,
}

pub struct SessionRegistry {
    db: Db,
    now_fn: Box<dyn Fn() -> NaiveDateTime + Send + Sync>,
}

impl SessionRegistry {
    pub fn new(db: Db) -> Self {
        Self::with_clock(db, Box::new(|| Local::now().naive_local()))
    }

    /// Create a registry with a custom clock, for deterministic tests.
    pub fn with_clock(db: Db, now_fn: Box<dyn Fn() -> NaiveDateTime + Send + Sync>) -> Self {
        Self { db, now_fn }
    }

    /// Allocate the next id for today (`YYYYMMDD` + 2-digit sequence) and
    /// store the snapshot. Count and insert run in one transaction on the
    /// mutex-guarded connection, so concurrent calls can never mint the same
    /// id.
    pub fn create_session(
        &self,
        room_id: &str,
        snapshot: &serde_json::Value,
    ) -> Result<String, StoreError> {
        let now = (self.now_fn)();
        let day = now.format("%Y%m%d").to_string();

        let mut conn = self.db.lock().unwrap();
        let tx = conn.transaction()?;

        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM sessions WHERE session_id LIKE ?1",
            params![format!("{}%", day)],
            |row| row.get(0),
        )?;

        let sequence = count + 1;
        if sequence > MAX_DAY_SEQUENCE {
            return Err(StoreError::SequenceExhausted(day));
        }

        let session_id = format!("{}{:02}", day, sequence);
        tx.execute(
            "INSERT INTO sessions (session_id, room_id, snapshot_json, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session_id,
                room_id,
                serde_json::to_string(snapshot)?,
                now.format(TIMESTAMP_FORMAT).to_string(),
            ],
        )?;
        tx.commit()?;

        log::info!("Stored session {} for room {}", session_id, room_id);
        Ok(session_id)
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let conn = self.db.lock().unwrap();
        let snapshot_json: Option<String> = conn
            .query_row(
                "SELECT snapshot_json FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;

        match snapshot_json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Session summaries, newest first, optionally filtered to one room.
    pub fn list_sessions(&self, room_id: Option<&str>) -> Result<Vec<SessionSummary>, StoreError> {
        let conn = self.db.lock().unwrap();
        let mut stmt = match room_id {
            Some(_) => conn.prepare(
                "SELECT session_id, room_id, created_at FROM sessions
                 WHERE room_id = ?1 ORDER BY created_at DESC",
            )?,
            None => conn.prepare(
                "SELECT session_id, room_id, created_at FROM sessions
                 ORDER BY created_at DESC",
            )?,
        };

        let map_row = |row: &rusqlite::Row<'_>| {
            Ok(SessionSummary {
                session_id: row.get(0)?,
                room_id: row.get(1)?,
                created_at: row.get(2)?,
            })
        };

        let sessions = match room_id {
            Some(id) => stmt
                .query_map(params![id], map_row)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt.query_map([], map_row)?.collect::<Result<Vec<_>, _>>()?,
        };
        Ok(sessions)
    }
}
