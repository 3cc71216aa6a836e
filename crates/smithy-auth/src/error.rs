//! Error types for the auth core.

use thiserror::Error;

/// Errors that can occur in the auth service and login flow.
#[derive(Error, Debug)]
pub enum AuthError {
    /// A field failed local validation before any request was sent
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Backend call failed
    #[error(transparent)]
    Api(#[from] smithy_api::ApiError),

    /// Session storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] smithy_storage::StorageError),

    /// An operation was attempted in a session state that does not allow it
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
}

impl AuthError {
    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        AuthError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
