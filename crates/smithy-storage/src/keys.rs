//! Storage key constants.

/// Storage keys used by the client.
///
/// Each key is independently readable and clearable; the namespacing keeps
/// entries from colliding with other applications sharing the same backend.
pub struct StorageKeys;

impl StorageKeys {
    /// Access token (short-lived bearer credential)
    pub const ACCESS_TOKEN: &'static str = "smithy.access_token";

    /// Refresh token (long-lived, used only by the refresh operation)
    pub const REFRESH_TOKEN: &'static str = "smithy.refresh_token";

    /// Session metadata (JSON: token type, expiry)
    pub const SESSION_META: &'static str = "smithy.session_meta";

    /// Cached user profile (JSON)
    pub const USER_PROFILE: &'static str = "smithy.user";

    /// Remembered login email (plaintext convenience value, not a secret)
    pub const REMEMBERED_EMAIL: &'static str = "smithy.remembered_email";
}
