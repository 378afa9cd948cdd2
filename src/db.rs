//! Database module
//!
//! A single SQLite key-value table holding serialized records by namespace.

mod schema;

pub use schema::*;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Key-Value Operations ====================

    /// Read the value stored under `namespace`
    pub fn get_value(&self, namespace: &str) -> DbResult<Option<String>> {
        Ok(self.get_record(namespace)?.map(|record| record.value))
    }

    /// Read the full record stored under `namespace`
    pub fn get_record(&self, namespace: &str) -> DbResult<Option<KvRecord>> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                "SELECT namespace, value, updated_at FROM kv_store WHERE namespace = ?1",
                params![namespace],
                |row| {
                    Ok(KvRecord {
                        namespace: row.get(0)?,
                        value: row.get(1)?,
                        updated_at: parse_datetime(&row.get::<_, String>(2)?),
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Insert or overwrite the value stored under `namespace`
    pub fn put_value(&self, namespace: &str, value: &str) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO kv_store (namespace, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(namespace) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![namespace, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_value() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_value("nothing-here").unwrap().is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let db = Database::open_in_memory().unwrap();
        db.put_value("ns", "first").unwrap();
        db.put_value("ns", "second").unwrap();
        assert_eq!(db.get_value("ns").unwrap().as_deref(), Some("second"));

        let record = db.get_record("ns").unwrap().unwrap();
        assert_eq!(record.namespace, "ns");
        assert!(record.updated_at <= Utc::now());
    }

    #[test]
    fn test_namespaces_are_independent() {
        let db = Database::open_in_memory().unwrap();
        db.put_value("a", "1").unwrap();
        db.put_value("b", "2").unwrap();
        assert_eq!(db.get_value("a").unwrap().as_deref(), Some("1"));
        assert_eq!(db.get_value("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_reopen_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("teammate.db");

        Database::open(&path).unwrap().put_value("ns", "kept").unwrap();

        let reopened = Database::open(&path).unwrap();
        assert_eq!(reopened.get_value("ns").unwrap().as_deref(), Some("kept"));
    }
}
