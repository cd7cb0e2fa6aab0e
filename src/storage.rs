use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    RwLock,
};

// Re-export core storage types so code using crate::storage::* still works
pub use finlog_core::storage::{KeyValueStore, StorageError};

/// In-memory key-value backend. Keys are held in a `BTreeMap` so prefix
/// scans come back in ascending order, which backup rotation depends on.
pub struct InMemoryKv {
    data: RwLock<BTreeMap<String, String>>,
    fail_next_set: AtomicBool,
}

impl Default for InMemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            fail_next_set: AtomicBool::new(false),
        }
    }

    /// Makes the next `set` fail with `QuotaExceeded`. Test support for the
    /// emergency-cleanup-and-retry path in the record store.
    pub fn fail_next_set(&self) {
        self.fail_next_set.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.data.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for InMemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.data.read().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_next_set.swap(false, Ordering::SeqCst) {
            return Err(StorageError::QuotaExceeded);
        }
        self.data
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.data.write().unwrap().remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let data = self.data.read().unwrap();
        let keys = data
            .range::<String, _>((Bound::Included(prefix.to_string()), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_scan_is_sorted_and_bounded() {
        let kv = InMemoryKv::new();
        kv.set("app_backup_3", "c").unwrap();
        kv.set("app_backup_1", "a").unwrap();
        kv.set("app_backup_2", "b").unwrap();
        kv.set("app_records", "r").unwrap();
        kv.set("other", "x").unwrap();

        let keys = kv.keys_with_prefix("app_backup_").unwrap();
        assert_eq!(keys, vec!["app_backup_1", "app_backup_2", "app_backup_3"]);
    }

    #[test]
    fn fail_next_set_fails_exactly_once() {
        let kv = InMemoryKv::new();
        kv.fail_next_set();
        assert!(matches!(
            kv.set("k", "v").unwrap_err(),
            StorageError::QuotaExceeded
        ));
        kv.set("k", "v").unwrap();
        assert_eq!(kv.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn remove_is_idempotent() {
        let kv = InMemoryKv::new();
        kv.set("k", "v").unwrap();
        kv.remove("k").unwrap();
        kv.remove("k").unwrap();
        assert_eq!(kv.get("k").unwrap(), None);
    }
}
