//! Room registry, upsert-by-id.

use crate::store::{Db, StoreError, TIMESTAMP_FORMAT};
use chrono::Local;
use rusqlite::params;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Room {
    pub room_id: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub updated_at: String,
}

pub struct RoomStore {
    db: Db,
}

impl RoomStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Create on first reference, update in place afterwards. Returns the
    /// stored row.
    pub fn upsert_room(
        &self,
        room_id: &str,
        name: Option<&str>,
        address: Option<&str>,
    ) -> Result<Room, StoreError> {
        let updated_at = Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string();
        let conn = self.db.lock().unwrap();
        conn.execute(
            "INSERT INTO rooms (room_id, name, address, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(room_id) DO UPDATE SET
                name = excluded.name,
                address = excluded.address,
                updated_at = excluded.updated_at",
            params![room_id, name, address, updated_at],
        )?;

        let room = conn.query_row(
            "SELECT room_id, name, address, updated_at FROM rooms WHERE room_id = ?1",
            params![room_id],
            |row| {
                Ok(Room {
                    room_id: row.get(0)?,
                    name: row.get(1)?,
                    address: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            },
        )?;
        Ok(room)
    }

    pub fn list_rooms(&self) -> Result<Vec<Room>, StoreError> {
        let conn = self.db.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT room_id, name, address, updated_at FROM rooms ORDER BY updated_at DESC",
        )?;
        let rooms = stmt
            .query_map([], |row| {
                Ok(Room {
                    room_id: row.get(0)?,
                    name: row.get(1)?,
                    address: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rooms)
    }
}
