//! Authenticated HTTP client with single-flight token refresh.
//!
//! Every authenticated request carries the vault's current access token.
//! When the backend answers 401, the client refreshes the token pair and
//! replays the request once. Concurrent 401s coordinate through one gate so
//! exactly one refresh call reaches the backend; the other callers wait and
//! replay with the tokens that refresh produced.

use crate::error::{ApiError, ApiResult};
use crate::models::{ErrorBody, RefreshRequest, TokenResponse};
use crate::routes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use smithy_core::Config;
use smithy_storage::{TokenPair, TokenVault};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

type SessionExpiredCallback = Box<dyn Fn() + Send + Sync>;

/// HTTP client for the Smithy backend.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    vault: Arc<TokenVault>,
    /// Serializes refresh attempts. `tokio::sync::Mutex` wakes waiters in
    /// FIFO order, so queued callers replay in the order they failed.
    refresh_gate: tokio::sync::Mutex<()>,
    /// Bumped after every refresh attempt, success or failure. A caller that
    /// recorded the counter before its request can tell whether someone else
    /// already refreshed while it waited for the gate.
    refresh_generation: AtomicU64,
    session_expired_callback: Mutex<Option<SessionExpiredCallback>>,
}

impl ApiClient {
    /// Create a client from config and a shared token vault.
    pub fn new(config: &Config, vault: Arc<TokenVault>) -> ApiResult<Self> {
        let base_url = Url::parse(&config.api_base_url)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url,
            vault,
            refresh_gate: tokio::sync::Mutex::new(()),
            refresh_generation: AtomicU64::new(0),
            session_expired_callback: Mutex::new(None),
        })
    }

    /// Register a callback invoked when the session becomes unrecoverable
    /// (no refresh token, or the refresh itself was rejected).
    pub fn on_session_expired<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.session_expired_callback.lock().unwrap() = Some(Box::new(callback));
    }

    /// The token vault this client reads from and writes to.
    pub fn vault(&self) -> &Arc<TokenVault> {
        &self.vault
    }

    // =========================================================================
    // Public requests (no bearer token, no refresh)
    // =========================================================================

    /// POST to an endpoint that does not require authentication.
    pub async fn post_public<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let response = self.http.post(url).json(body).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    // =========================================================================
    // Authenticated requests
    // =========================================================================

    /// GET an endpoint that requires authentication.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self.request_authed(reqwest::Method::GET, path, None).await?;
        Ok(response.json().await?)
    }

    /// POST to an endpoint that requires authentication.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let response = self
            .request_authed(reqwest::Method::POST, path, Some(body))
            .await?;
        Ok(response.json().await?)
    }

    /// POST to an authenticated endpoint, discarding the response body.
    pub async fn post_no_content<B>(&self, path: &str, body: &B) -> ApiResult<()>
    where
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.request_authed(reqwest::Method::POST, path, Some(body))
            .await?;
        Ok(())
    }

    async fn request_authed(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ApiResult<reqwest::Response> {
        let generation = self.refresh_generation.load(Ordering::SeqCst);
        let token = self
            .vault
            .access_token()?
            .ok_or(ApiError::SessionExpired)?;

        let response = self
            .build_request(method.clone(), path, body.as_ref(), &token)?
            .send()
            .await?;

        if response.status().as_u16() != 401 {
            return Self::check(response).await;
        }

        tracing::debug!(path, "Request rejected with 401, attempting token refresh");
        let token = self.recover_unauthorized(generation).await?;

        // One replay per request. A second 401 here means the fresh token was
        // rejected too, which is a backend problem rather than staleness.
        let response = self
            .build_request(method, path, body.as_ref(), &token)?
            .send()
            .await?;
        Self::check(response).await
    }

    fn build_request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&serde_json::Value>,
        token: &str,
    ) -> ApiResult<reqwest::RequestBuilder> {
        let url = self.endpoint(path)?;
        let mut request = self.http.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request)
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Convert a non-success response into `ApiError::Response`, parsing the
    /// backend's error envelope when present.
    async fn check(response: reqwest::Response) -> ApiResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(envelope) => Err(ApiError::Response {
                status,
                code: envelope.code,
                message: if envelope.message.is_empty() {
                    envelope.error.unwrap_or_else(|| format!("HTTP {status}"))
                } else {
                    envelope.message
                },
                details: envelope.details,
            }),
            Err(_) => Err(ApiError::Response {
                status,
                code: None,
                message: format!("HTTP {status}"),
                details: None,
            }),
        }
    }

    // =========================================================================
    // Token refresh
    // =========================================================================

    /// Refresh the stored token pair, coordinating with in-flight refreshes.
    ///
    /// Callers that arrive while a refresh is underway wait for it instead of
    /// issuing their own; if it already succeeded they return immediately.
    pub async fn refresh_session(&self) -> ApiResult<()> {
        let generation = self.refresh_generation.load(Ordering::SeqCst);
        let _gate = self.refresh_gate.lock().await;

        if self.refresh_generation.load(Ordering::SeqCst) != generation {
            // Another caller refreshed while we waited for the gate
            return match self.vault.access_token()? {
                Some(_) => Ok(()),
                None => Err(ApiError::SessionExpired),
            };
        }

        self.perform_refresh().await
    }

    /// Recover from a 401: obtain a usable access token, refreshing at most
    /// once across all concurrent callers.
    async fn recover_unauthorized(&self, seen_generation: u64) -> ApiResult<String> {
        let _gate = self.refresh_gate.lock().await;

        if self.refresh_generation.load(Ordering::SeqCst) != seen_generation {
            // A refresh already happened while we waited. If it succeeded the
            // vault holds fresh tokens; if it failed the vault was cleared and
            // this session is over.
            return self.vault.access_token()?.ok_or(ApiError::SessionExpired);
        }

        self.perform_refresh().await?;
        self.vault.access_token()?.ok_or(ApiError::SessionExpired)
    }

    /// Perform the actual refresh call. Caller must hold the refresh gate.
    async fn perform_refresh(&self) -> ApiResult<()> {
        let refresh_token = match self.vault.refresh_token()? {
            Some(token) => token,
            None => {
                self.notify_session_expired();
                return Err(ApiError::SessionExpired);
            }
        };

        let url = self.endpoint(routes::AUTH_REFRESH)?;
        let response = self
            .http
            .post(url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        if !response.status().is_success() {
            // A rejected refresh token is terminal. Clear the session so
            // queued callers fail fast instead of retrying, and bump the
            // generation so they know a refresh attempt already ran.
            let status = response.status().as_u16();
            tracing::warn!(status, "Token refresh rejected, clearing session");
            self.vault.clear_session()?;
            self.refresh_generation.fetch_add(1, Ordering::SeqCst);
            self.notify_session_expired();
            return Err(ApiError::SessionExpired);
        }

        let token_response: TokenResponse = response.json().await?;
        let pair = TokenPair::from_wire(
            token_response.access_token,
            token_response.refresh_token,
            token_response.token_type,
            token_response.expires_in,
        );
        self.vault.set_session(&pair, &token_response.user)?;
        self.refresh_generation.fetch_add(1, Ordering::SeqCst);

        tracing::debug!("Token refresh succeeded");
        Ok(())
    }

    fn notify_session_expired(&self) {
        let callback = self.session_expired_callback.lock().unwrap();
        if let Some(ref callback) = *callback {
            callback();
        }
    }
}
