//! Storage - key-value persistence for trips and adjustment factors
//!
//! The engine only needs `get`/`set` on opaque byte values under stable keys.
//!
//! # Backends
//! - [`SqliteStore`]: single `kv` table in a SQLite file (WAL mode)
//! - [`MemoryStore`]: process-local map, used by tests and embedders

use std::collections::HashMap;
use std::path::{Path as FilePath, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use super::error::{FareError, Result};

/// Key under which the trip collection is stored
pub const TRIPS_KEY: &str = "fareTrips";

/// Key under which the adjustment factors are stored
pub const FACTORS_KEY: &str = "fareAdjustmentFactors";

/// Backend trait for persisted state
///
/// Implemented by SqliteStore and MemoryStore
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when the key was never written
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// SQLite-backed store
///
/// Uses Mutex to make the connection shareable behind `Arc<dyn KeyValueStore>`
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open or create a database
    pub fn open(path: &FilePath) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;

        let store = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };
        store.init_schema()?;

        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Database file, `None` for in-memory stores
    pub fn path(&self) -> Option<&FilePath> {
        self.path.as_deref()
    }

    fn init_schema(&self) -> Result<()> {
        self.lock()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| FareError::Lock(e.to_string()))
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| FareError::Lock(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| FareError::Lock(e.to_string()))?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_get_set() -> Result<()> {
        let store = SqliteStore::open_memory()?;

        assert!(store.get(TRIPS_KEY)?.is_none());

        store.set(TRIPS_KEY, b"[]")?;
        assert_eq!(store.get(TRIPS_KEY)?, Some(b"[]".to_vec()));

        store.set(TRIPS_KEY, b"[1]")?;
        assert_eq!(store.get(TRIPS_KEY)?, Some(b"[1]".to_vec()));

        Ok(())
    }

    #[test]
    fn test_sqlite_persists_across_connections() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let db_path = dir.path().join("data.db");

        {
            let store = SqliteStore::open(&db_path)?;
            store.set(FACTORS_KEY, br#"{"timeOfDay":{}}"#)?;
        }

        let reopened = SqliteStore::open(&db_path)?;
        assert_eq!(
            reopened.get(FACTORS_KEY)?,
            Some(br#"{"timeOfDay":{}}"#.to_vec())
        );
        assert_eq!(reopened.path(), Some(db_path.as_path()));

        Ok(())
    }

    #[test]
    fn test_memory_store() -> Result<()> {
        let store = MemoryStore::new();
        assert!(store.get("missing")?.is_none());
        store.set("k", b"v")?;
        assert_eq!(store.get("k")?, Some(b"v".to_vec()));
        Ok(())
    }
}
