//! SQLite store for Huddle.
//!
//! The [`Database`] struct owns a mutex-guarded [`rusqlite::Connection`] and
//! guarantees migrations run before any other operation. All concurrency
//! control beyond that mutex is SQLite's own; callers on the async runtime
//! are expected to reach the store through `spawn_blocking`.

pub mod error;
pub mod migrations;
pub mod models;

mod attachments;
mod channels;
mod dms;
mod messages;
mod push;
mod reactions;
mod receipts;
mod typing;
mod users;

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use tracing::info;

pub use crate::error::{Result, StoreError};
pub use crate::messages::{INITIAL_FETCH_LIMIT, POLL_FETCH_LIMIT};

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self::init(conn)?;
        info!("database opened at {}", path.display());
        Ok(db)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;
        f(&mut conn)
    }
}

/// Current time as an RFC 3339 UTC string with microsecond precision.
///
/// Every timestamp in the store goes through this helper so the strings are
/// fixed-width and lexicographic comparison in SQL is a correct time
/// comparison.
pub fn now_ts() -> String {
    format_ts(Utc::now())
}

pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(s: &str, col: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub(crate) fn parse_uuid(s: &str, col: usize) -> rusqlite::Result<uuid::Uuid> {
    uuid::Uuid::parse_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_at_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huddle.db");

        let db = Database::open(&path).expect("should open");
        db.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
            assert_eq!(n, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn timestamps_are_fixed_width_and_ordered() {
        let a = now_ts();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = now_ts();
        assert_eq!(a.len(), b.len());
        assert!(a < b);
    }
}
