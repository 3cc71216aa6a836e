//! Session state machine and observable session handle.
//!
//! Authentication state is tracked by an explicit finite state machine
//! instead of being derived from storage checks on every read.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │ Unauthenticated │ (initial)
//! └────────┬────────┘
//!          │ AuthStarted            SessionRestored
//!          ▼                  ┌──────────────────────┐
//! ┌─────────────────┐         │                      │
//! │     Loading     │         │                      ▼
//! └────────┬────────┘         │             ┌─────────────────┐
//!          │ AuthSucceeded ───┼───────────► │  Authenticated  │
//!          │ AuthFailed ──► Unauthenticated └────────┬────────┘
//!          │ MfaPending ──► Unauthenticated          │ LoggedOut
//!          ▼                                 Unauthenticated
//! ```
//!
//! `Loading` covers each in-flight auth request. An MFA challenge drops the
//! session back to `Unauthenticated`: until the code is verified the user is
//! not in, and only the login flow remembers that a challenge is pending.

use crate::{AuthError, AuthResult};
use rust_fsm::*;
use serde::{Deserialize, Serialize};
use smithy_storage::{TokenVault, UserProfile};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Unauthenticated)

    Unauthenticated => {
        AuthStarted => Loading,
        SessionRestored => Authenticated
    },
    Loading => {
        AuthSucceeded => Authenticated,
        AuthFailed => Unauthenticated,
        MfaPending => Unauthenticated
    },
    Authenticated => {
        AuthStarted => Loading,
        LoggedOut => Unauthenticated
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Public view of the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session.
    Unauthenticated,
    /// A login, registration, or restore is in progress.
    Loading,
    /// Logged in with a stored token pair.
    Authenticated,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }
}

impl From<&SessionMachineState> for SessionState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Unauthenticated => SessionState::Unauthenticated,
            SessionMachineState::Loading => SessionState::Loading,
            SessionMachineState::Authenticated => SessionState::Authenticated,
        }
    }
}

/// Immutable snapshot of the session, handed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub state: SessionState,
    /// Present only when authenticated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

/// Callback type for session change notifications.
pub type SessionCallback = Box<dyn Fn(Session) + Send + Sync>;

/// Handle returned by [`SessionHandle::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Shared, observable handle to the session.
///
/// Holds the FSM and the in-memory copy of the logged-in user. Components
/// subscribe to be told about every state change; each subscriber receives
/// the full snapshot, so late subscribers never miss the current state
/// (they can call [`snapshot`](Self::snapshot) on registration).
pub struct SessionHandle {
    fsm: Mutex<SessionMachine>,
    user: Mutex<Option<UserProfile>>,
    subscribers: Mutex<Vec<(SubscriptionId, SessionCallback)>>,
    next_subscription_id: AtomicU64,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    /// Create a handle in the `Unauthenticated` state.
    pub fn new() -> Self {
        Self {
            fsm: Mutex::new(SessionMachine::new()),
            user: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
            next_subscription_id: AtomicU64::new(0),
        }
    }

    /// Current session snapshot.
    pub fn snapshot(&self) -> Session {
        let fsm = self.fsm.lock().unwrap();
        let state = SessionState::from(fsm.state());
        drop(fsm);
        Session {
            state,
            user: self.user.lock().unwrap().clone(),
        }
    }

    /// Current state only.
    pub fn state(&self) -> SessionState {
        let fsm = self.fsm.lock().unwrap();
        SessionState::from(fsm.state())
    }

    /// The logged-in user, if any.
    pub fn user(&self) -> Option<UserProfile> {
        self.user.lock().unwrap().clone()
    }

    /// Register a callback invoked on every state change.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(Session) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription_id.fetch_add(1, Ordering::SeqCst));
        self.subscribers
            .lock()
            .unwrap()
            .push((id, Box::new(callback)));
        id
    }

    /// Remove a previously registered callback.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|(sub_id, _)| *sub_id != id);
    }

    /// Restore a session from the vault without any network traffic.
    ///
    /// Returns true when stored tokens and user were found and the session
    /// moved to `Authenticated`. An expired access token is fine here; the
    /// API client refreshes it lazily on the first rejected request.
    pub fn bootstrap(&self, vault: &TokenVault) -> AuthResult<bool> {
        if !vault.has_session()? {
            tracing::debug!("No stored session to restore");
            return Ok(false);
        }
        let user = vault.user()?;
        self.set_user(user);
        self.transition(&SessionMachineInput::SessionRestored)?;
        tracing::info!("Session restored from storage");
        Ok(true)
    }

    /// Replace the in-memory user.
    pub(crate) fn set_user(&self, user: Option<UserProfile>) {
        *self.user.lock().unwrap() = user;
    }

    /// Apply an FSM input, notifying subscribers if the state changed.
    pub(crate) fn transition(&self, input: &SessionMachineInput) -> AuthResult<SessionState> {
        let mut fsm = self.fsm.lock().unwrap();
        let old_state = SessionState::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_state = SessionState::from(fsm.state());
        drop(fsm);

        if old_state != new_state {
            tracing::debug!(?old_state, ?new_state, "Session state transition");
            self.notify();
        }

        Ok(new_state)
    }

    /// Force the session back to `Unauthenticated`, whatever state it is in.
    ///
    /// Used when the API client reports the session expired out from under
    /// us; there is no meaningful transition error to surface in that case.
    pub(crate) fn force_logout(&self) {
        let mut fsm = self.fsm.lock().unwrap();
        let changed = *fsm.state() != SessionMachineState::Unauthenticated;
        *fsm = SessionMachine::new();
        drop(fsm);

        self.set_user(None);
        if changed {
            tracing::info!("Session forced to unauthenticated");
            self.notify();
        }
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        let subscribers = self.subscribers.lock().unwrap();
        for (_, callback) in subscribers.iter() {
            callback(snapshot.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smithy_storage::{TokenPair, UserRole};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn test_user() -> UserProfile {
        UserProfile {
            id: "user-123".to_string(),
            email: "smith@example.com".to_string(),
            username: None,
            role: UserRole::User,
            is_verified: true,
            is_active: true,
            mfa_enabled: false,
            full_name: None,
            avatar_url: None,
            last_login_at: None,
        }
    }

    #[test]
    fn test_initial_state_is_unauthenticated() {
        let handle = SessionHandle::new();
        assert_eq!(handle.state(), SessionState::Unauthenticated);
        assert!(handle.user().is_none());
    }

    #[test]
    fn test_login_transitions() {
        let handle = SessionHandle::new();

        handle.transition(&SessionMachineInput::AuthStarted).unwrap();
        assert_eq!(handle.state(), SessionState::Loading);
        assert!(handle.state().is_loading());

        handle.set_user(Some(test_user()));
        handle
            .transition(&SessionMachineInput::AuthSucceeded)
            .unwrap();
        assert!(handle.state().is_authenticated());
        assert_eq!(handle.user().unwrap().id, "user-123");
    }

    #[test]
    fn test_failed_login_returns_to_unauthenticated() {
        let handle = SessionHandle::new();

        handle.transition(&SessionMachineInput::AuthStarted).unwrap();
        handle.transition(&SessionMachineInput::AuthFailed).unwrap();
        assert_eq!(handle.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let handle = SessionHandle::new();

        // Cannot succeed without starting
        let result = handle.transition(&SessionMachineInput::AuthSucceeded);
        assert!(matches!(result, Err(AuthError::InvalidStateTransition(_))));

        // Cannot log out while unauthenticated
        let result = handle.transition(&SessionMachineInput::LoggedOut);
        assert!(result.is_err());
    }

    #[test]
    fn test_subscribers_see_every_change() {
        let handle = SessionHandle::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        {
            let seen = Arc::clone(&seen);
            handle.subscribe(move |session| {
                seen.lock().unwrap().push(session.state);
            });
        }

        handle.transition(&SessionMachineInput::AuthStarted).unwrap();
        handle.set_user(Some(test_user()));
        handle
            .transition(&SessionMachineInput::AuthSucceeded)
            .unwrap();
        handle.transition(&SessionMachineInput::LoggedOut).unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                SessionState::Loading,
                SessionState::Authenticated,
                SessionState::Unauthenticated
            ]
        );
    }

    #[test]
    fn test_multiple_subscribers_all_notified() {
        let handle = SessionHandle::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = Arc::clone(&count);
            handle.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        handle.transition(&SessionMachineInput::AuthStarted).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let handle = SessionHandle::new();
        let count = Arc::new(AtomicUsize::new(0));

        let id = {
            let count = Arc::clone(&count);
            handle.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };

        handle.transition(&SessionMachineInput::AuthStarted).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        handle.unsubscribe(id);
        handle.transition(&SessionMachineInput::AuthFailed).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bootstrap_with_stored_session() {
        let vault = TokenVault::in_memory();
        let pair = TokenPair::from_wire("access", "refresh", "bearer", 1800);
        vault.set_session(&pair, &test_user()).unwrap();

        let handle = SessionHandle::new();
        assert!(handle.bootstrap(&vault).unwrap());
        assert!(handle.state().is_authenticated());
        assert_eq!(handle.user().unwrap().email, "smith@example.com");
    }

    #[test]
    fn test_bootstrap_without_stored_session() {
        let vault = TokenVault::in_memory();
        let handle = SessionHandle::new();

        assert!(!handle.bootstrap(&vault).unwrap());
        assert_eq!(handle.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_bootstrap_with_expired_token_still_restores() {
        // Expired access token is not a reason to drop the session; the
        // refresh token may still be good
        let vault = TokenVault::in_memory();
        let pair = TokenPair::from_wire("access", "refresh", "bearer", -60);
        vault.set_session(&pair, &test_user()).unwrap();

        let handle = SessionHandle::new();
        assert!(handle.bootstrap(&vault).unwrap());
        assert!(handle.state().is_authenticated());
    }

    #[test]
    fn test_force_logout_from_any_state() {
        let handle = SessionHandle::new();
        handle.transition(&SessionMachineInput::AuthStarted).unwrap();

        let notified = Arc::new(AtomicUsize::new(0));
        {
            let notified = Arc::clone(&notified);
            handle.subscribe(move |session| {
                assert_eq!(session.state, SessionState::Unauthenticated);
                notified.fetch_add(1, Ordering::SeqCst);
            });
        }

        handle.force_logout();
        assert_eq!(handle.state(), SessionState::Unauthenticated);
        assert!(handle.user().is_none());
        assert_eq!(notified.load(Ordering::SeqCst), 1);

        // Idempotent, and no duplicate notification
        handle.force_logout();
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_snapshot_carries_user_only_when_set() {
        let handle = SessionHandle::new();
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.state, SessionState::Unauthenticated);
        assert!(snapshot.user.is_none());
    }
}
