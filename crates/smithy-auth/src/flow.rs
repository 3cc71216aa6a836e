//! Two-step login flow: credentials, then (for MFA-enabled accounts) a code.
//!
//! The controller owns everything the login screen needs between steps,
//! most importantly the partial auth token from an MFA challenge. That token
//! lives only here, in memory; it is never written to the vault, so an
//! abandoned MFA prompt leaves nothing behind.

use crate::service::{AuthService, LoginOutcome};
use crate::session::SessionState;
use crate::{AuthError, AuthResult};
use smithy_storage::UserProfile;
use std::sync::{Arc, Mutex};

/// Which screen of the login flow is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStep {
    /// Email and password form.
    Credentials,
    /// Six-digit code form, shown after an MFA challenge.
    MfaCode,
}

/// Result of a flow submission.
#[derive(Debug)]
pub enum FlowOutcome {
    /// Login finished; the session is authenticated.
    Authenticated(UserProfile),
    /// The backend wants an MFA code; the flow advanced to [`LoginStep::MfaCode`].
    MfaRequired,
}

struct RememberChoice {
    remember: bool,
    email: String,
}

/// Drives the login conversation for a UI.
pub struct LoginFlowController {
    service: Arc<AuthService>,
    step: Mutex<LoginStep>,
    partial_auth_token: Mutex<Option<String>>,
    remember_choice: Mutex<Option<RememberChoice>>,
    last_error: Mutex<Option<String>>,
}

impl LoginFlowController {
    pub fn new(service: Arc<AuthService>) -> Self {
        Self {
            service,
            step: Mutex::new(LoginStep::Credentials),
            partial_auth_token: Mutex::new(None),
            remember_choice: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    pub fn step(&self) -> LoginStep {
        *self.step.lock().unwrap()
    }

    /// The message to show inline under the active form, if the last
    /// submission failed.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }

    /// Email to prefill the credentials form with.
    pub fn initial_email(&self) -> Option<String> {
        self.service.remembered_email().ok().flatten()
    }

    /// Submit the credentials form.
    pub async fn submit_credentials(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> AuthResult<FlowOutcome> {
        if self.step() != LoginStep::Credentials {
            return Err(AuthError::InvalidStateTransition(
                "Credentials already accepted, awaiting MFA code".to_string(),
            ));
        }
        self.set_error(None);

        match self.service.login(email, password, remember).await {
            Ok(LoginOutcome::Authenticated(user)) => {
                self.apply_remember_choice(remember, email);
                self.reset();
                Ok(FlowOutcome::Authenticated(user))
            }
            Ok(LoginOutcome::MfaRequired(challenge)) => {
                *self.partial_auth_token.lock().unwrap() = Some(challenge.partial_auth_token);
                *self.remember_choice.lock().unwrap() = Some(RememberChoice {
                    remember,
                    email: email.trim().to_string(),
                });
                *self.step.lock().unwrap() = LoginStep::MfaCode;
                Ok(FlowOutcome::MfaRequired)
            }
            Err(err) => {
                self.set_error(Some(err.to_string()));
                Err(err)
            }
        }
    }

    /// Submit the MFA code form.
    pub async fn submit_mfa_code(&self, code: &str) -> AuthResult<FlowOutcome> {
        if self.step() != LoginStep::MfaCode {
            return Err(AuthError::InvalidStateTransition(
                "No MFA challenge in progress".to_string(),
            ));
        }
        let token = self
            .partial_auth_token
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| {
                AuthError::InvalidStateTransition("No MFA challenge in progress".to_string())
            })?;
        self.set_error(None);

        match self.service.complete_mfa_login(&token, code).await {
            Ok(user) => {
                if let Some(choice) = self.remember_choice.lock().unwrap().take() {
                    self.apply_remember_choice(choice.remember, &choice.email);
                }
                self.reset();
                Ok(FlowOutcome::Authenticated(user))
            }
            Err(err) => {
                self.set_error(Some(err.to_string()));
                if self.challenge_is_dead(&err) {
                    // The partial token was rejected, not the code. Start over.
                    tracing::debug!("MFA challenge no longer valid, returning to credentials");
                    self.abandon_challenge()?;
                }
                Err(err)
            }
        }
    }

    /// Go back from the code form to the credentials form, abandoning the
    /// challenge.
    pub fn back(&self) -> AuthResult<()> {
        if self.step() == LoginStep::MfaCode {
            self.abandon_challenge()?;
        }
        self.set_error(None);
        Ok(())
    }

    /// A 401 from MFA completion means either a bad code (retryable with the
    /// same challenge) or a dead challenge token. The backend distinguishes
    /// them only by message, "Invalid MFA code" versus a rejected session.
    fn challenge_is_dead(&self, err: &AuthError) -> bool {
        match err {
            AuthError::Api(api_err) if api_err.is_unauthorized() => {
                !err.to_string().contains("MFA code")
            }
            _ => false,
        }
    }

    fn abandon_challenge(&self) -> AuthResult<()> {
        *self.partial_auth_token.lock().unwrap() = None;
        *self.remember_choice.lock().unwrap() = None;
        *self.step.lock().unwrap() = LoginStep::Credentials;
        if self.service.session().state() == SessionState::Loading {
            self.service.cancel_login()?;
        }
        Ok(())
    }

    fn apply_remember_choice(&self, remember: bool, email: &str) {
        let result = if remember {
            self.service.remember_email(email)
        } else {
            self.service.forget_email()
        };
        if let Err(err) = result {
            tracing::warn!(error = %err, "Could not persist remember-me choice");
        }
    }

    fn reset(&self) {
        *self.step.lock().unwrap() = LoginStep::Credentials;
        *self.partial_auth_token.lock().unwrap() = None;
        *self.remember_choice.lock().unwrap() = None;
        self.set_error(None);
    }

    fn set_error(&self, message: Option<String>) {
        *self.last_error.lock().unwrap() = message;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionHandle;
    use smithy_api::ApiClient;
    use smithy_core::Config;
    use smithy_storage::TokenVault;

    fn test_flow() -> LoginFlowController {
        let config = Config {
            log_level: "info".to_string(),
            api_base_url: "http://localhost:1".to_string(),
            request_timeout_secs: 30,
        };
        let vault = Arc::new(TokenVault::in_memory());
        let api = Arc::new(ApiClient::new(&config, vault).unwrap());
        let service = AuthService::new(api, Arc::new(SessionHandle::new()));
        LoginFlowController::new(service)
    }

    #[test]
    fn test_flow_starts_on_credentials() {
        let flow = test_flow();
        assert_eq!(flow.step(), LoginStep::Credentials);
        assert!(flow.last_error().is_none());
        assert!(flow.initial_email().is_none());
    }

    #[tokio::test]
    async fn test_mfa_submit_without_challenge_is_rejected() {
        let flow = test_flow();
        let result = flow.submit_mfa_code("123456").await;
        assert!(matches!(result, Err(AuthError::InvalidStateTransition(_))));
    }

    #[tokio::test]
    async fn test_validation_error_is_shown_inline() {
        let flow = test_flow();

        let result = flow.submit_credentials("bad", "password123", false).await;
        assert!(result.is_err());
        assert_eq!(flow.step(), LoginStep::Credentials);
        assert!(flow.last_error().unwrap().contains("email"));
    }

    #[test]
    fn test_back_from_credentials_is_noop() {
        let flow = test_flow();
        flow.back().unwrap();
        assert_eq!(flow.step(), LoginStep::Credentials);
    }
}
