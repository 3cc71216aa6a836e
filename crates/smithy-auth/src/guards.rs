//! Route guards: decide whether navigation may proceed given the session.

use crate::session::{SessionHandle, SessionState};
use std::sync::{Arc, Mutex};

/// What the router should do with a navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Let the navigation through.
    Allow,
    /// Session state is still being resolved; ask again when it settles.
    Hold,
    /// Send the user to the login screen.
    RedirectToLogin,
    /// Send the user to the app home; they are already signed in.
    RedirectToHome,
}

/// Guard for routes that require an authenticated session.
///
/// When it turns an unauthenticated user away it records the path they were
/// heading to, so the login flow can return them there afterwards.
pub struct ProtectedGuard {
    session: Arc<SessionHandle>,
    return_path: Mutex<Option<String>>,
}

impl ProtectedGuard {
    pub fn new(session: Arc<SessionHandle>) -> Self {
        Self {
            session,
            return_path: Mutex::new(None),
        }
    }

    pub fn check(&self, requested_path: &str) -> GuardDecision {
        match self.session.state() {
            SessionState::Authenticated => GuardDecision::Allow,
            SessionState::Loading => GuardDecision::Hold,
            SessionState::Unauthenticated => {
                tracing::debug!(path = requested_path, "Unauthenticated, redirecting to login");
                *self.return_path.lock().unwrap() = Some(requested_path.to_string());
                GuardDecision::RedirectToLogin
            }
        }
    }

    /// The path to return to after login. One-shot: taking it clears it, so
    /// a stale destination can never leak into a later login.
    pub fn take_return_path(&self) -> Option<String> {
        self.return_path.lock().unwrap().take()
    }
}

/// Guard for entry routes (login, register) that make no sense while
/// signed in.
pub struct EntryGuard {
    session: Arc<SessionHandle>,
}

impl EntryGuard {
    pub fn new(session: Arc<SessionHandle>) -> Self {
        Self { session }
    }

    pub fn check(&self) -> GuardDecision {
        match self.session.state() {
            SessionState::Authenticated => GuardDecision::RedirectToHome,
            // Loading included: the login screen is where an in-progress
            // login lives, so it stays reachable
            _ => GuardDecision::Allow,
        }
    }
}
