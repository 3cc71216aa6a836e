//! Client-side authentication core for Smithy.
//!
//! Ties the token vault, the API client, and an explicit session state
//! machine together: login (with the optional MFA second step), registration,
//! logout, session bootstrap from stored tokens, and route guards.

mod error;
mod flow;
mod guards;
mod service;
mod session;
mod validation;

pub use error::{AuthError, AuthResult};
pub use flow::{FlowOutcome, LoginFlowController, LoginStep};
pub use guards::{EntryGuard, GuardDecision, ProtectedGuard};
pub use service::{AuthService, LoginOutcome};
pub use session::{Session, SessionHandle, SessionState, SubscriptionId};
pub use validation::{sanitize_mfa_code, validate_email, validate_password, MFA_CODE_LENGTH};
