//! Session storage abstraction for the Smithy client.
//!
//! This crate provides the persistence layer behind the auth session:
//! - A [`SessionStorage`] capability trait with in-memory, file-backed, and
//!   no-op implementations
//! - [`TokenVault`], the high-level store for the token pair, the cached
//!   user profile, and the remembered-email convenience value

mod file;
mod keys;
mod memory;
mod noop;
mod traits;
mod user;
mod vault;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use noop::NoopStorage;
pub use traits::SessionStorage;
pub use user::{UserProfile, UserRole};
pub use vault::{SessionMeta, TokenPair, TokenVault};

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific storage error
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
