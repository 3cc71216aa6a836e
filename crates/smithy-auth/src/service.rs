//! Auth operations against the backend: login, MFA completion, registration,
//! logout, and token refresh, all keeping the session handle and token vault
//! in step with each other.

use crate::session::{SessionHandle, SessionMachineInput, SessionState};
use crate::validation::{sanitize_mfa_code, validate_email, validate_password, MFA_CODE_LENGTH};
use crate::{AuthError, AuthResult};
use smithy_api::{
    routes, ApiClient, LoginRequest, LogoutRequest, MfaChallenge, MfaCompleteRequest,
    RegisterRequest, TokenResponse,
};
use smithy_storage::{TokenPair, UserProfile};
use std::sync::Arc;

/// Result of a login attempt.
#[derive(Debug)]
pub enum LoginOutcome {
    /// Credentials accepted, session established.
    Authenticated(UserProfile),
    /// Password accepted but an MFA code is required to finish.
    ///
    /// The challenge token lives only in the caller's memory; it is never
    /// written to the vault.
    MfaRequired(MfaChallenge),
}

/// High-level auth operations.
pub struct AuthService {
    api: Arc<ApiClient>,
    session: Arc<SessionHandle>,
}

impl AuthService {
    /// Create a service over an API client and a session handle.
    ///
    /// Registers itself for session-expiry notifications: when the client
    /// gives up on a refresh, the session drops to unauthenticated without
    /// any caller involvement.
    pub fn new(api: Arc<ApiClient>, session: Arc<SessionHandle>) -> Arc<Self> {
        let service = Arc::new(Self { api, session });

        let session = Arc::clone(&service.session);
        service.api.on_session_expired(move || {
            tracing::info!("Session expired, dropping to unauthenticated");
            session.force_logout();
        });

        service
    }

    pub fn session(&self) -> &Arc<SessionHandle> {
        &self.session
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    // =========================================================================
    // Login and registration
    // =========================================================================

    /// Attempt a password login.
    ///
    /// On an MFA-enabled account this returns `MfaRequired` with the session
    /// back at `Unauthenticated`; the caller holds the challenge and finishes
    /// with [`complete_mfa_login`](Self::complete_mfa_login). The password
    /// length rule applies to registration only; login just requires one.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
    ) -> AuthResult<LoginOutcome> {
        validate_email(email)?;
        if password.is_empty() {
            return Err(AuthError::validation("password", "Password is required"));
        }

        self.session.transition(&SessionMachineInput::AuthStarted)?;

        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
            remember_me,
        };

        match self
            .api
            .post_public::<_, TokenResponse>(routes::AUTH_LOGIN, &request)
            .await
        {
            Ok(response) => {
                let user = self.store_session(response)?;
                self.session
                    .transition(&SessionMachineInput::AuthSucceeded)?;
                tracing::info!(user_id = %user.id, "Login succeeded");
                Ok(LoginOutcome::Authenticated(user))
            }
            Err(err) => {
                if let Some(challenge) = err.mfa_challenge() {
                    // Not a failure, but not a session either: the user is
                    // out until the code is verified
                    tracing::debug!("Login requires MFA completion");
                    self.session.transition(&SessionMachineInput::MfaPending)?;
                    return Ok(LoginOutcome::MfaRequired(challenge));
                }
                self.session.transition(&SessionMachineInput::AuthFailed)?;
                Err(err.into())
            }
        }
    }

    /// Finish an MFA login with the challenge token and a TOTP code.
    ///
    /// A rejected code returns the session to `Unauthenticated`; the caller
    /// may retry with the same challenge as long as the backend accepts it.
    pub async fn complete_mfa_login(
        &self,
        partial_auth_token: &str,
        code: &str,
    ) -> AuthResult<UserProfile> {
        let code = sanitize_mfa_code(code);
        if code.len() != MFA_CODE_LENGTH {
            return Err(AuthError::validation(
                "code",
                format!("Enter the {MFA_CODE_LENGTH}-digit code"),
            ));
        }

        self.session.transition(&SessionMachineInput::AuthStarted)?;

        let request = MfaCompleteRequest {
            partial_auth_token: partial_auth_token.to_string(),
            mfa_code: code,
        };

        match self
            .api
            .post_public::<_, TokenResponse>(routes::AUTH_MFA_COMPLETE, &request)
            .await
        {
            Ok(response) => {
                let user = self.store_session(response)?;
                self.session
                    .transition(&SessionMachineInput::AuthSucceeded)?;
                tracing::info!(user_id = %user.id, "MFA login completed");
                Ok(user)
            }
            Err(err) => {
                self.session.transition(&SessionMachineInput::AuthFailed)?;
                Err(err.into())
            }
        }
    }

    /// Abandon an in-progress login, returning the session to unauthenticated.
    pub fn cancel_login(&self) -> AuthResult<()> {
        if self.session.state() == SessionState::Loading {
            self.session.transition(&SessionMachineInput::AuthFailed)?;
        }
        Ok(())
    }

    /// Register a new account. The backend logs the new user straight in.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        username: Option<String>,
    ) -> AuthResult<UserProfile> {
        validate_email(email)?;
        validate_password(password)?;

        self.session.transition(&SessionMachineInput::AuthStarted)?;

        let request = RegisterRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
            username,
            first_name: None,
            last_name: None,
        };

        match self
            .api
            .post_public::<_, TokenResponse>(routes::AUTH_REGISTER, &request)
            .await
        {
            Ok(response) => {
                let user = self.store_session(response)?;
                self.session
                    .transition(&SessionMachineInput::AuthSucceeded)?;
                tracing::info!(user_id = %user.id, "Registration succeeded");
                Ok(user)
            }
            Err(err) => {
                self.session.transition(&SessionMachineInput::AuthFailed)?;
                Err(err.into())
            }
        }
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Restore a stored session without touching the network.
    pub fn bootstrap(&self) -> AuthResult<bool> {
        self.session.bootstrap(self.api.vault())
    }

    /// Log out: tell the backend to revoke the refresh token, then clear
    /// local state regardless of whether the backend call worked.
    pub async fn logout(&self) -> AuthResult<()> {
        let vault = self.api.vault();
        let request = LogoutRequest {
            refresh_token: vault.refresh_token()?,
        };

        if let Err(err) = self.api.post_no_content(routes::AUTH_LOGOUT, &request).await {
            tracing::warn!(error = %err, "Logout request failed, clearing local session anyway");
        }

        vault.clear_session()?;
        self.session.set_user(None);
        if self
            .session
            .transition(&SessionMachineInput::LoggedOut)
            .is_err()
        {
            // Logout from a state with no LoggedOut edge still ends
            // unauthenticated
            self.session.force_logout();
        }
        Ok(())
    }

    /// Refresh the token pair now instead of waiting for a 401.
    ///
    /// Returns false (and drops the session) when the refresh token is no
    /// longer usable; other failures, like a network outage, surface as
    /// errors without touching the session.
    pub async fn refresh_tokens(&self) -> AuthResult<bool> {
        match self.api.refresh_session().await {
            Ok(()) => Ok(true),
            Err(smithy_api::ApiError::SessionExpired) => {
                self.session.force_logout();
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Fetch the current user from the backend and update the caches.
    pub async fn current_user(&self) -> AuthResult<UserProfile> {
        let user: UserProfile = self.api.get(routes::USERS_ME).await?;
        self.api.vault().set_user(&user)?;
        self.session.set_user(Some(user.clone()));
        Ok(user)
    }

    // =========================================================================
    // Remembered email
    // =========================================================================

    /// Persist the login email for prefilling the next login form.
    pub fn remember_email(&self, email: &str) -> AuthResult<()> {
        self.api.vault().set_remembered_email(email.trim())?;
        Ok(())
    }

    /// The email remembered from a previous login, if any.
    pub fn remembered_email(&self) -> AuthResult<Option<String>> {
        Ok(self.api.vault().remembered_email()?)
    }

    /// Forget the remembered email.
    pub fn forget_email(&self) -> AuthResult<()> {
        self.api.vault().clear_remembered_email()?;
        Ok(())
    }

    /// Persist an accepted auth response and cache the user.
    ///
    /// If the vault write fails the session drops back to unauthenticated
    /// before the error surfaces; the backend accepted the credentials but
    /// without stored tokens there is no session, and the state machine must
    /// not be left sitting in `Loading`.
    fn store_session(&self, response: TokenResponse) -> AuthResult<UserProfile> {
        let pair = TokenPair::from_wire(
            response.access_token,
            response.refresh_token,
            response.token_type,
            response.expires_in,
        );
        if let Err(err) = self.api.vault().set_session(&pair, &response.user) {
            tracing::error!(error = %err, "Could not persist session tokens");
            self.session.force_logout();
            return Err(err.into());
        }
        self.session.set_user(Some(response.user.clone()));
        Ok(response.user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smithy_core::Config;
    use smithy_storage::TokenVault;

    fn test_service() -> Arc<AuthService> {
        let config = Config {
            log_level: "info".to_string(),
            api_base_url: "http://localhost:1".to_string(),
            request_timeout_secs: 30,
        };
        let vault = Arc::new(TokenVault::in_memory());
        let api = Arc::new(ApiClient::new(&config, vault).unwrap());
        AuthService::new(api, Arc::new(SessionHandle::new()))
    }

    #[tokio::test]
    async fn test_login_rejects_invalid_email_before_any_request() {
        let service = test_service();

        let result = service.login("not-an-email", "password123", false).await;
        assert!(matches!(
            result,
            Err(AuthError::Validation { ref field, .. }) if field == "email"
        ));
        // Validation failure never moves the state machine
        assert_eq!(service.session().state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_login_rejects_empty_password() {
        let service = test_service();

        let result = service.login("smith@example.com", "", false).await;
        assert!(matches!(
            result,
            Err(AuthError::Validation { ref field, .. }) if field == "password"
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_short_password() {
        let service = test_service();

        let result = service.register("smith@example.com", "short", None).await;
        assert!(matches!(
            result,
            Err(AuthError::Validation { ref field, .. }) if field == "password"
        ));
        assert_eq!(service.session().state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_complete_mfa_rejects_malformed_code() {
        let service = test_service();

        let result = service.complete_mfa_login("pt_1", "12").await;
        assert!(matches!(
            result,
            Err(AuthError::Validation { ref field, .. }) if field == "code"
        ));
    }

    #[tokio::test]
    async fn test_cancel_login_is_noop_when_not_loading() {
        let service = test_service();
        service.cancel_login().unwrap();
        assert_eq!(service.session().state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_remembered_email_roundtrip() {
        let service = test_service();

        assert!(service.remembered_email().unwrap().is_none());
        service.remember_email("  smith@example.com ").unwrap();
        assert_eq!(
            service.remembered_email().unwrap().as_deref(),
            Some("smith@example.com")
        );
        service.forget_email().unwrap();
        assert!(service.remembered_email().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bootstrap_without_session() {
        let service = test_service();
        assert!(!service.bootstrap().unwrap());
        assert_eq!(service.session().state(), SessionState::Unauthenticated);
    }
}
