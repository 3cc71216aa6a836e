//! Error types for the Smithy API client.

use thiserror::Error;

/// Errors that can occur while talking to the backend.
#[derive(Error, Debug)]
pub enum ApiError {
    /// HTTP transport failed (connection, timeout, TLS)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend returned an error response
    #[error("API error ({status}): {message}")]
    Response {
        status: u16,
        code: Option<String>,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// Session storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] smithy_storage::StorageError),

    /// No usable session: tokens are missing or could not be refreshed
    #[error("Session expired")]
    SessionExpired,

    /// Response body did not have the expected shape
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Request URL could not be built
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// An MFA challenge extracted from a login rejection.
///
/// The partial token proves the password step succeeded; it is only ever
/// held in memory by the login flow, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct MfaChallenge {
    pub partial_auth_token: String,
}

impl ApiError {
    /// Whether this is a 401 response from the backend.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Response { status: 401, .. })
    }

    /// Extract an MFA challenge, if this error is one.
    ///
    /// The backend signals "password accepted, MFA code required" as a 401
    /// whose details carry `required_mfa: true` and a partial auth token.
    pub fn mfa_challenge(&self) -> Option<MfaChallenge> {
        if let ApiError::Response {
            status: 401,
            details: Some(details),
            ..
        } = self
        {
            if details.get("required_mfa").and_then(|v| v.as_bool()) == Some(true) {
                let token = details.get("partial_auth_token")?.as_str()?;
                return Some(MfaChallenge {
                    partial_auth_token: token.to_string(),
                });
            }
        }
        None
    }
}

/// Result type alias using ApiError.
pub type ApiResult<T> = Result<T, ApiError>;
