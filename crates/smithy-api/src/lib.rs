//! HTTP client for the Smithy backend API.
//!
//! Wraps `reqwest` with bearer-token attachment from the token vault and
//! transparent, single-flight token refresh on 401 responses.

mod client;
mod error;
mod models;
pub mod routes;

pub use client::ApiClient;
pub use error::{ApiError, ApiResult, MfaChallenge};
pub use models::{
    ErrorBody, LoginRequest, LogoutRequest, MfaCompleteRequest, RefreshRequest, RegisterRequest,
    TokenResponse,
};
