//! No-op storage backend.

use crate::{SessionStorage, StorageResult};

/// Storage for contexts with no persistence available.
///
/// Behaves as a permanently empty store: reads return `None`, writes are
/// accepted and discarded, removals report nothing removed. Nothing errors,
/// so callers never need to special-case the absent-storage situation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStorage;

impl NoopStorage {
    /// Create a new no-op store.
    pub fn new() -> Self {
        Self
    }
}

impl SessionStorage for NoopStorage {
    fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
        Ok(())
    }

    fn get(&self, _key: &str) -> StorageResult<Option<String>> {
        Ok(None)
    }

    fn remove(&self, _key: &str) -> StorageResult<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_storage_always_empty() {
        let storage = NoopStorage::new();

        storage.set("key", "value").unwrap();
        assert_eq!(storage.get("key").unwrap(), None);
        assert!(!storage.has("key").unwrap());
        assert!(!storage.remove("key").unwrap());
    }
}
