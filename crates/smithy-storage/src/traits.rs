//! Storage trait definitions.

use crate::StorageResult;

/// Capability trait for session storage backends.
///
/// Implementations are plain key-value stores; all session semantics live in
/// [`crate::TokenVault`]. Backends for contexts without any persistence
/// should behave as an empty store rather than error (see
/// [`crate::NoopStorage`]).
pub trait SessionStorage: Send + Sync {
    /// Store a value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Remove a value, returning whether it existed
    fn remove(&self, key: &str) -> StorageResult<bool>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
