//! High-level API for the persisted auth session.

use crate::{SessionStorage, StorageError, StorageKeys, StorageResult, UserProfile};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Seconds of remaining lifetime under which the access token is treated as
/// already expired, so a refresh happens before the server starts rejecting.
const EXPIRY_SKEW_SECS: i64 = 60;

/// An access/refresh token pair with its expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived bearer token attached to every authenticated request
    pub access_token: String,
    /// Long-lived token used only to mint a new access token
    pub refresh_token: String,
    /// Token type (always "bearer" in practice)
    pub token_type: String,
    /// When the access token expires (RFC 3339)
    pub expires_at: String,
}

impl TokenPair {
    /// Build a pair from wire values, converting the relative `expires_in`
    /// seconds into an absolute expiry timestamp.
    pub fn from_wire(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        token_type: impl Into<String>,
        expires_in: i64,
    ) -> Self {
        let expires_at = chrono::Utc::now() + chrono::Duration::seconds(expires_in);
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_type: token_type.into(),
            expires_at: expires_at.to_rfc3339(),
        }
    }
}

/// Session metadata persisted alongside the tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    /// Token type from the auth response
    pub token_type: String,
    /// When the access token expires (RFC 3339)
    pub expires_at: String,
}

/// High-level store for the auth session.
///
/// Owns the token pair and the cached user profile. All methods take one
/// internal lock so multi-key writes are atomic in effect: no reader can
/// observe a token pair without its user, or half of a cleared session.
pub struct TokenVault {
    storage: Mutex<Box<dyn SessionStorage>>,
}

impl TokenVault {
    /// Create a vault over the given storage backend.
    pub fn new(storage: Box<dyn SessionStorage>) -> Self {
        Self {
            storage: Mutex::new(storage),
        }
    }

    /// Create a vault over a fresh in-memory backend.
    pub fn in_memory() -> Self {
        Self::new(Box::new(crate::MemoryStorage::new()))
    }

    /// Store a complete session: token pair and user profile together.
    pub fn set_session(&self, pair: &TokenPair, user: &UserProfile) -> StorageResult<()> {
        let storage = self.storage.lock().unwrap();

        let meta = SessionMeta {
            token_type: pair.token_type.clone(),
            expires_at: pair.expires_at.clone(),
        };
        let meta_json =
            serde_json::to_string(&meta).map_err(|e| StorageError::Encoding(e.to_string()))?;
        let user_json =
            serde_json::to_string(user).map_err(|e| StorageError::Encoding(e.to_string()))?;

        storage.set(StorageKeys::ACCESS_TOKEN, &pair.access_token)?;
        storage.set(StorageKeys::REFRESH_TOKEN, &pair.refresh_token)?;
        storage.set(StorageKeys::SESSION_META, &meta_json)?;
        storage.set(StorageKeys::USER_PROFILE, &user_json)?;
        Ok(())
    }

    /// Retrieve the access token.
    pub fn access_token(&self) -> StorageResult<Option<String>> {
        self.storage.lock().unwrap().get(StorageKeys::ACCESS_TOKEN)
    }

    /// Retrieve the refresh token.
    pub fn refresh_token(&self) -> StorageResult<Option<String>> {
        self.storage.lock().unwrap().get(StorageKeys::REFRESH_TOKEN)
    }

    /// Retrieve the session metadata.
    pub fn session_meta(&self) -> StorageResult<Option<SessionMeta>> {
        match self.storage.lock().unwrap().get(StorageKeys::SESSION_META)? {
            Some(json) => {
                let meta: SessionMeta = serde_json::from_str(&json)
                    .map_err(|e| StorageError::Encoding(e.to_string()))?;
                Ok(Some(meta))
            }
            None => Ok(None),
        }
    }

    /// Retrieve the cached user profile.
    pub fn user(&self) -> StorageResult<Option<UserProfile>> {
        match self.storage.lock().unwrap().get(StorageKeys::USER_PROFILE)? {
            Some(json) => {
                let user: UserProfile = serde_json::from_str(&json)
                    .map_err(|e| StorageError::Encoding(e.to_string()))?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// Retrieve the full stored token pair, or `None` if any part is missing.
    pub fn token_pair(&self) -> StorageResult<Option<TokenPair>> {
        let storage = self.storage.lock().unwrap();
        let (Some(access_token), Some(refresh_token), Some(meta_json)) = (
            storage.get(StorageKeys::ACCESS_TOKEN)?,
            storage.get(StorageKeys::REFRESH_TOKEN)?,
            storage.get(StorageKeys::SESSION_META)?,
        ) else {
            return Ok(None);
        };
        let meta: SessionMeta =
            serde_json::from_str(&meta_json).map_err(|e| StorageError::Encoding(e.to_string()))?;
        Ok(Some(TokenPair {
            access_token,
            refresh_token,
            token_type: meta.token_type,
            expires_at: meta.expires_at,
        }))
    }

    /// Replace the cached user profile, leaving tokens untouched.
    pub fn set_user(&self, user: &UserProfile) -> StorageResult<()> {
        let user_json =
            serde_json::to_string(user).map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.storage
            .lock()
            .unwrap()
            .set(StorageKeys::USER_PROFILE, &user_json)
    }

    /// Check whether a complete session (tokens + user) is stored.
    pub fn has_session(&self) -> StorageResult<bool> {
        let storage = self.storage.lock().unwrap();
        let has_access = storage.has(StorageKeys::ACCESS_TOKEN)?;
        let has_refresh = storage.has(StorageKeys::REFRESH_TOKEN)?;
        let has_user = storage.has(StorageKeys::USER_PROFILE)?;
        Ok(has_access && has_refresh && has_user)
    }

    /// Check whether the stored access token is expired (or nearly so).
    ///
    /// Returns true when no session metadata exists.
    pub fn is_expired(&self) -> StorageResult<bool> {
        match self.session_meta()? {
            Some(meta) => {
                let expires_at = chrono::DateTime::parse_from_rfc3339(&meta.expires_at)
                    .map_err(|e| StorageError::Encoding(e.to_string()))?;
                let now = chrono::Utc::now();
                Ok(expires_at.signed_duration_since(now).num_seconds() < EXPIRY_SKEW_SECS)
            }
            None => Ok(true),
        }
    }

    /// Clear the session (tokens, metadata, cached user).
    ///
    /// The remembered email survives; it is a login-form convenience, not
    /// part of the session.
    pub fn clear_session(&self) -> StorageResult<()> {
        let storage = self.storage.lock().unwrap();
        let _ = storage.remove(StorageKeys::ACCESS_TOKEN);
        let _ = storage.remove(StorageKeys::REFRESH_TOKEN);
        let _ = storage.remove(StorageKeys::SESSION_META);
        let _ = storage.remove(StorageKeys::USER_PROFILE);
        Ok(())
    }

    /// Store the remembered login email.
    pub fn set_remembered_email(&self, email: &str) -> StorageResult<()> {
        self.storage
            .lock()
            .unwrap()
            .set(StorageKeys::REMEMBERED_EMAIL, email)
    }

    /// Retrieve the remembered login email.
    pub fn remembered_email(&self) -> StorageResult<Option<String>> {
        self.storage
            .lock()
            .unwrap()
            .get(StorageKeys::REMEMBERED_EMAIL)
    }

    /// Clear the remembered login email.
    pub fn clear_remembered_email(&self) -> StorageResult<()> {
        let _ = self
            .storage
            .lock()
            .unwrap()
            .remove(StorageKeys::REMEMBERED_EMAIL);
        Ok(())
    }

    /// Clear everything, including the remembered email.
    pub fn clear_all(&self) -> StorageResult<()> {
        let storage = self.storage.lock().unwrap();
        let _ = storage.remove(StorageKeys::ACCESS_TOKEN);
        let _ = storage.remove(StorageKeys::REFRESH_TOKEN);
        let _ = storage.remove(StorageKeys::SESSION_META);
        let _ = storage.remove(StorageKeys::USER_PROFILE);
        let _ = storage.remove(StorageKeys::REMEMBERED_EMAIL);
        Ok(())
    }
}
