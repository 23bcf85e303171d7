//! Freeform log entries on items.

use super::items::item_exists;
use super::{Database, now_ms};
use crate::error::{ItemError, Result};
use crate::types::LogEntry;
use rusqlite::{Connection, params};

pub(crate) fn insert_log(conn: &Connection, item_id: &str, message: &str) -> Result<LogEntry> {
    let now = now_ms();
    conn.execute(
        "INSERT INTO item_logs (item_id, message, created_at) VALUES (?1, ?2, ?3)",
        params![item_id, message, now],
    )?;

    Ok(LogEntry {
        id: conn.last_insert_rowid(),
        item_id: item_id.to_string(),
        message: message.to_string(),
        created_at: now,
    })
}

impl Database {
    /// Append a note to an item.
    pub fn add_log(&self, item_id: &str, message: &str) -> Result<LogEntry> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ItemError::invalid("message", "log message is required"));
        }

        self.with_conn(|conn| {
            if !item_exists(conn, item_id)? {
                return Err(ItemError::item_not_found(item_id));
            }
            insert_log(conn, item_id, message)
        })
    }

    /// Log entries for an item, oldest first.
    pub fn list_logs(&self, item_id: &str) -> Result<Vec<LogEntry>> {
        self.with_conn(|conn| {
            if !item_exists(conn, item_id)? {
                return Err(ItemError::item_not_found(item_id));
            }

            let mut stmt = conn.prepare(
                "SELECT id, item_id, message, created_at FROM item_logs
                 WHERE item_id = ?1 ORDER BY created_at ASC, id ASC",
            )?;

            let entries = stmt
                .query_map(params![item_id], |row| {
                    Ok(LogEntry {
                        id: row.get(0)?,
                        item_id: row.get(1)?,
                        message: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(entries)
        })
    }
}
