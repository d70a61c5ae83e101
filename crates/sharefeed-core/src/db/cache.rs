//! Durable alert cache

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};

const CATCHUP_TIMESTAMP_KEY: &str = "catchup_last_timestamp";

/// Trait for durable alert storage.
///
/// Records are keyed by a row id the store assigns on first write, not by the
/// alert id.
pub trait AlertCache {
    /// Write a record. `None` allocates a new row; the row id is returned.
    fn put(&self, record_id: Option<u32>, payload: &[u8]) -> Result<u32>;

    /// Delete a record; deleting a missing row is not an error
    fn remove(&self, record_id: u32) -> Result<()>;

    /// Every record, in row id order
    fn load_all(&self) -> Result<Vec<(u32, Vec<u8>)>>;

    /// Drop every record and the catch-up bookkeeping
    fn clear(&self) -> Result<()>;

    /// Newest catch-up timestamp recorded by the last purge
    fn load_catchup_timestamp(&self) -> Result<Option<i64>>;

    fn save_catchup_timestamp(&self, timestamp: i64) -> Result<()>;
}

/// `SQLite` implementation of `AlertCache`
pub struct SqliteAlertCache<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteAlertCache<'a> {
    /// Create a new cache over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Number of cached records
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM alerts", [], |row| row.get(0))?;
        usize::try_from(count).map_err(|_| Error::InvalidInput("negative row count".into()))
    }
}

impl AlertCache for SqliteAlertCache<'_> {
    fn put(&self, record_id: Option<u32>, payload: &[u8]) -> Result<u32> {
        let now = chrono::Utc::now().timestamp();

        if let Some(record_id) = record_id {
            self.conn.execute(
                "INSERT OR REPLACE INTO alerts (record_id, payload, updated_at) VALUES (?, ?, ?)",
                params![record_id, payload, now],
            )?;
            return Ok(record_id);
        }

        self.conn.execute(
            "INSERT INTO alerts (payload, updated_at) VALUES (?, ?)",
            params![payload, now],
        )?;
        let row_id = self.conn.last_insert_rowid();
        u32::try_from(row_id)
            .map_err(|_| Error::InvalidInput(format!("alert row id {row_id} out of range")))
    }

    fn remove(&self, record_id: u32) -> Result<()> {
        self.conn
            .execute("DELETE FROM alerts WHERE record_id = ?", params![record_id])?;
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<(u32, Vec<u8>)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT record_id, payload FROM alerts ORDER BY record_id ASC")?;

        let records = stmt
            .query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, Vec<u8>>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM alerts", [])?;
        self.conn.execute(
            "DELETE FROM alert_state WHERE key = ?",
            params![CATCHUP_TIMESTAMP_KEY],
        )?;
        Ok(())
    }

    fn load_catchup_timestamp(&self) -> Result<Option<i64>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM alert_state WHERE key = ?",
                params![CATCHUP_TIMESTAMP_KEY],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value.and_then(|value| value.parse().ok()))
    }

    fn save_catchup_timestamp(&self, timestamp: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO alert_state (key, value) VALUES (?, ?)",
            params![CATCHUP_TIMESTAMP_KEY, timestamp.to_string()],
        )?;
        Ok(())
    }
}
