//! In-memory backend

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::RwLock;

use super::{encode_key, Backend};
use crate::core_store::errors::{StoreError, StoreResult};
use crate::core_store::options::BackendKind;

/// Entries held in a map keyed by encoded key
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<String, (Value, Value)>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(format!("Failed to acquire lock: {}", e))
}

impl Backend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn lookup(&self, key: &Value) -> StoreResult<Option<Value>> {
        let entries = self.entries.read().map_err(lock_error)?;
        Ok(entries.get(&encode_key(key)).map(|(_, value)| value.clone()))
    }

    fn exists(&self, key: &Value) -> StoreResult<bool> {
        let entries = self.entries.read().map_err(lock_error)?;
        Ok(entries.contains_key(&encode_key(key)))
    }

    fn insert(&self, key: Value, value: Value) -> StoreResult<()> {
        let mut entries = self.entries.write().map_err(lock_error)?;
        entries.insert(encode_key(&key), (key, value));
        Ok(())
    }

    fn erase(&self, key: &Value) -> StoreResult<()> {
        let mut entries = self.entries.write().map_err(lock_error)?;
        entries.remove(&encode_key(key));
        Ok(())
    }

    fn size(&self) -> StoreResult<u64> {
        let entries = self.entries.read().map_err(lock_error)?;
        Ok(entries.len() as u64)
    }

    fn snapshot(&self) -> StoreResult<Vec<(Value, Value)>> {
        let entries = self.entries.read().map_err(lock_error)?;
        Ok(entries.values().cloned().collect())
    }

    fn restore(&self, snapshot: Vec<(Value, Value)>) -> StoreResult<()> {
        let mut entries = self.entries.write().map_err(lock_error)?;
        *entries = snapshot.into_iter().map(|(k, v)| (encode_key(&k), (k, v))).collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_lookup_erase() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.lookup(&json!("k")).unwrap(), None);

        backend.insert(json!("k"), json!({"v": 1})).unwrap();
        assert_eq!(backend.lookup(&json!("k")).unwrap(), Some(json!({"v": 1})));
        assert!(backend.exists(&json!("k")).unwrap());

        backend.erase(&json!("k")).unwrap();
        assert!(!backend.exists(&json!("k")).unwrap());
        backend.erase(&json!("k")).unwrap();
    }

    #[test]
    fn test_structured_keys() {
        let backend = MemoryBackend::new();
        backend.insert(json!(["10.0.0.1", 80]), json!(true)).unwrap();

        assert_eq!(backend.lookup(&json!(["10.0.0.1", 80])).unwrap(), Some(json!(true)));
        assert_eq!(backend.lookup(&json!(["10.0.0.1", 443])).unwrap(), None);
    }

    #[test]
    fn test_snapshot_and_restore_replace_contents() {
        let source = MemoryBackend::new();
        source.insert(json!("a"), json!(1)).unwrap();
        source.insert(json!("b"), json!(2)).unwrap();

        let copy = MemoryBackend::new();
        copy.insert(json!("stale"), json!(0)).unwrap();
        copy.restore(source.snapshot().unwrap()).unwrap();

        assert_eq!(copy.size().unwrap(), 2);
        assert!(!copy.exists(&json!("stale")).unwrap());
        assert_eq!(copy.lookup(&json!("b")).unwrap(), Some(json!(2)));
    }
}
