//! Wire types for the Smithy auth endpoints.

use serde::{Deserialize, Serialize};
use smithy_storage::UserProfile;

/// Body for `POST /v1/auth/login`.
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Asks the backend for a longer-lived refresh token
    pub remember_me: bool,
}

/// Body for `POST /v1/auth/register`.
#[derive(Debug, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// Body for `POST /v1/auth/mfa/complete`.
#[derive(Debug, Serialize)]
pub struct MfaCompleteRequest {
    pub partial_auth_token: String,
    pub mfa_code: String,
}

/// Body for `POST /v1/auth/refresh`.
#[derive(Debug, Serialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Body for `POST /v1/auth/logout`.
#[derive(Debug, Serialize)]
pub struct LogoutRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Successful response from login, register, MFA completion, and refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub user: UserProfile,
}

/// Error envelope the backend wraps every failure in.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}
