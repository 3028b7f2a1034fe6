//! SQLite backend
//!
//! One table, `entries(key TEXT PRIMARY KEY, value TEXT)`. Keys are stored in
//! their canonical JSON rendering, values as JSON text.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use serde_json::Value;
use std::path::Path;

use super::{encode_key, Backend};
use crate::core_store::errors::{StoreError, StoreResult};
use crate::core_store::options::BackendKind;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS entries (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)";

pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteBackend {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let manager = SqliteConnectionManager::file(path.as_ref());
        let pool = Pool::new(manager).map_err(pool_error)?;
        Self::with_pool(pool)
    }

    /// Private in-memory database
    pub fn memory() -> StoreResult<Self> {
        // Every in-memory connection is its own database, so keep exactly one.
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(pool_error)?;
        Self::with_pool(pool)
    }

    fn with_pool(pool: Pool<SqliteConnectionManager>) -> StoreResult<Self> {
        let conn = pool.get().map_err(pool_error)?;
        conn.execute(SCHEMA, [])?;
        drop(conn);
        Ok(Self { pool })
    }

    fn conn(&self) -> StoreResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(pool_error)
    }
}

fn pool_error(e: r2d2::Error) -> StoreError {
    StoreError::Backend(format!("SQLite pool error: {}", e))
}

impl Backend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn lookup(&self, key: &Value) -> StoreResult<Option<Value>> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM entries WHERE key = ?",
                params![encode_key(key)],
                |row| row.get(0),
            )
            .optional()?;

        Ok(raw.map(|text| serde_json::from_str::<Value>(&text)).transpose()?)
    }

    fn exists(&self, key: &Value) -> StoreResult<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM entries WHERE key = ?", params![encode_key(key)], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    fn insert(&self, key: Value, value: Value) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO entries (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![encode_key(&key), serde_json::to_string(&value)?],
        )?;
        Ok(())
    }

    fn erase(&self, key: &Value) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM entries WHERE key = ?", params![encode_key(key)])?;
        Ok(())
    }

    fn size(&self) -> StoreResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn snapshot(&self) -> StoreResult<Vec<(Value, Value)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key, value FROM entries ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (key, value) = row?;
            entries.push((serde_json::from_str(&key)?, serde_json::from_str(&value)?));
        }
        Ok(entries)
    }

    fn restore(&self, entries: Vec<(Value, Value)>) -> StoreResult<()> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM entries", [])?;
        for (key, value) in entries {
            tx.execute(
                "INSERT OR REPLACE INTO entries (key, value) VALUES (?, ?)",
                params![encode_key(&key), serde_json::to_string(&value)?],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
