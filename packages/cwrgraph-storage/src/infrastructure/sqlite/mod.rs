//! SQLite adapter for ObjectStore
//!
//! Schema:
//! - `objects(id TEXT PRIMARY KEY, data BLOB NOT NULL, stored_at TEXT NOT NULL)`
//!
//! Objects are immutable, so `put` is `INSERT OR IGNORE` and the first
//! `stored_at` wins.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;

use crate::domain::{ContentId, MetaObject, ObjectStore};
use crate::{Result, StorageError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS objects (
    id        TEXT PRIMARY KEY,
    data      BLOB NOT NULL,
    stored_at TEXT NOT NULL
);
";

pub struct SqliteObjectStore {
    conn: Mutex<Connection>,
}

impl SqliteObjectStore {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Opening SQLite object store at {}", path.display());
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn new_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl ObjectStore for SqliteObjectStore {
    async fn put(&self, object: &MetaObject) -> Result<ContentId> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO objects (id, data, stored_at) VALUES (?1, ?2, ?3)",
            params![object.id().as_str(), object.bytes(), Utc::now().to_rfc3339()],
        )?;
        Ok(object.id().clone())
    }

    async fn get(&self, id: &ContentId) -> Result<MetaObject> {
        let data: Option<Vec<u8>> = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT data FROM objects WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?
        };

        let bytes = data.ok_or_else(|| StorageError::object_not_found(id))?;
        let object = MetaObject::from_bytes(bytes)?;
        if object.id() != id {
            return Err(StorageError::integrity(id, object.id()));
        }
        Ok(object)
    }

    async fn contains(&self, id: &ContentId) -> Result<bool> {
        let conn = self.conn.lock();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM objects WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM objects", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
