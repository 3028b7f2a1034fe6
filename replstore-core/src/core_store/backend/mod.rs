/*
    backend - physical storage for stores that keep local data

    Owners keep the authoritative entries in a backend; replicas keep their
    materialized copy in one. Remote views have none.

    Keys and values are host values (JSON). Backends compare keys by their
    canonical JSON rendering.
*/

use serde_json::Value;
use std::sync::Arc;

use super::errors::StoreResult;
use super::options::{BackendKind, BackendOptions};

mod memory;
mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

/// Key/value storage engine
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Value stored under `key`, if any
    fn lookup(&self, key: &Value) -> StoreResult<Option<Value>>;

    fn exists(&self, key: &Value) -> StoreResult<bool> {
        Ok(self.lookup(key)?.is_some())
    }

    /// Insert or overwrite
    fn insert(&self, key: Value, value: Value) -> StoreResult<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn erase(&self, key: &Value) -> StoreResult<()>;

    /// Number of entries
    fn size(&self) -> StoreResult<u64>;

    /// Every entry, ordered by encoded key
    fn snapshot(&self) -> StoreResult<Vec<(Value, Value)>>;

    /// Replace all contents with `entries`
    fn restore(&self, entries: Vec<(Value, Value)>) -> StoreResult<()>;
}

/// Canonical encoding of a key
pub(crate) fn encode_key(key: &Value) -> String {
    key.to_string()
}

/// Instantiate the backend selected for a store
pub fn open_backend(
    kind: BackendKind,
    options: Option<&BackendOptions>,
) -> StoreResult<Arc<dyn Backend>> {
    match kind {
        BackendKind::Memory => Ok(Arc::new(MemoryBackend::new())),
        BackendKind::Sqlite => {
            let sqlite = options.and_then(|o| o.sqlite.as_ref());
            match sqlite.and_then(|s| s.path.as_ref()) {
                Some(path) => Ok(Arc::new(SqliteBackend::open(path)?)),
                None => Ok(Arc::new(SqliteBackend::memory()?)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_key_is_canonical() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(encode_key(&a), encode_key(&b));
        assert_ne!(encode_key(&json!("1")), encode_key(&json!(1)));
    }

    #[test]
    fn test_open_backend_kinds() {
        let memory = open_backend(BackendKind::Memory, None).unwrap();
        assert_eq!(memory.kind(), BackendKind::Memory);

        let sqlite = open_backend(BackendKind::Sqlite, None).unwrap();
        assert_eq!(sqlite.kind(), BackendKind::Sqlite);
    }

    #[test]
    fn test_open_sqlite_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let options = BackendOptions::sqlite(dir.path().join("store.db"));

        let backend = open_backend(BackendKind::Sqlite, Some(&options)).unwrap();
        backend.insert(json!("k"), json!("v")).unwrap();
        assert!(dir.path().join("store.db").exists());
    }
}
