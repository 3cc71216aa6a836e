//! Cached user profile types.

use serde::{Deserialize, Serialize};

/// User roles, mirroring the backend's closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Moderator,
    User,
    Guest,
}

/// User profile as returned by the backend and cached locally.
///
/// The authoritative copy lives server-side; this cache exists so the
/// session can be rehydrated on startup without a network round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User UUID
    pub id: String,
    /// User email
    pub email: String,
    /// Username (backend derives one from the email when not provided)
    #[serde(default)]
    pub username: Option<String>,
    /// Role for access control
    pub role: UserRole,
    /// Whether the email address has been verified
    #[serde(default)]
    pub is_verified: bool,
    /// Whether the account is active
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Whether multi-factor authentication is enabled
    #[serde(default)]
    pub mfa_enabled: bool,
    /// Display name
    #[serde(default)]
    pub full_name: Option<String>,
    /// Avatar image URL
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Last login timestamp (RFC 3339)
    #[serde(default)]
    pub last_login_at: Option<String>,
}

fn default_true() -> bool {
    true
}
