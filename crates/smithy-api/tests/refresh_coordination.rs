//! Integration tests for 401 recovery and refresh single-flighting.

use serde_json::json;
use smithy_api::{routes, ApiClient, ApiError};
use smithy_core::Config;
use smithy_storage::{TokenPair, TokenVault, UserProfile, UserRole};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_user() -> UserProfile {
    UserProfile {
        id: "user-123".to_string(),
        email: "smith@example.com".to_string(),
        username: Some("smith".to_string()),
        role: UserRole::User,
        is_verified: true,
        is_active: true,
        mfa_enabled: false,
        full_name: None,
        avatar_url: None,
        last_login_at: None,
    }
}

fn user_json() -> serde_json::Value {
    json!({
        "id": "user-123",
        "email": "smith@example.com",
        "username": "smith",
        "role": "user",
        "is_verified": true,
        "is_active": true,
        "mfa_enabled": false
    })
}

fn token_response(access: &str, refresh: &str) -> serde_json::Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "bearer",
        "expires_in": 1800,
        "user": user_json()
    })
}

fn unauthorized_body() -> serde_json::Value {
    json!({
        "error": "Unauthorized",
        "message": "Token has expired",
        "code": "TOKEN_EXPIRED",
        "status_code": 401
    })
}

async fn client_with_session(server: &MockServer) -> Arc<ApiClient> {
    let config = Config {
        log_level: "info".to_string(),
        api_base_url: server.uri(),
        request_timeout_secs: 30,
    };
    let vault = Arc::new(TokenVault::in_memory());
    let pair = TokenPair::from_wire("stale-access", "refresh-1", "bearer", 1800);
    vault.set_session(&pair, &test_user()).unwrap();
    Arc::new(ApiClient::new(&config, vault).unwrap())
}

#[tokio::test]
async fn concurrent_unauthorized_responses_trigger_exactly_one_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/users/me"))
        .and(header("authorization", "Bearer stale-access"))
        .respond_with(ResponseTemplate::new(401).set_body_json(unauthorized_body()))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/users/me"))
        .and(header("authorization", "Bearer fresh-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(
            "fresh-access",
            "refresh-2",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_session(&server).await;

    let mut handles = Vec::new();
    for _ in 0..5 {
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move {
            client.get::<serde_json::Value>(routes::USERS_ME).await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(result.is_ok(), "request failed: {:?}", result.err());
    }

    // The vault ends up with the refreshed pair
    let vault = client.vault();
    assert_eq!(
        vault.access_token().unwrap(),
        Some("fresh-access".to_string())
    );
    assert_eq!(
        vault.refresh_token().unwrap(),
        Some("refresh-2".to_string())
    );

    // MockServer verifies expect(1) on drop
}

#[tokio::test]
async fn rejected_refresh_is_terminal_for_all_waiters() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/users/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(unauthorized_body()))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "Unauthorized",
            "message": "Invalid refresh token",
            "code": "INVALID_REFRESH_TOKEN",
            "status_code": 401
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_session(&server).await;

    let expired_notices = Arc::new(AtomicUsize::new(0));
    {
        let expired_notices = Arc::clone(&expired_notices);
        client.on_session_expired(move || {
            expired_notices.fetch_add(1, Ordering::SeqCst);
        });
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move {
            client.get::<serde_json::Value>(routes::USERS_ME).await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(ApiError::SessionExpired)));
    }

    // Session is gone; only the caller that performed the refresh notified
    assert!(!client.vault().has_session().unwrap());
    assert_eq!(expired_notices.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn successful_requests_do_not_touch_the_refresh_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_with_session(&server).await;

    let result: serde_json::Value = client.get(routes::USERS_ME).await.unwrap();
    assert_eq!(result["id"], "user-123");
}

#[tokio::test]
async fn request_is_replayed_at_most_once() {
    let server = MockServer::start().await;

    // Every request 401s, even with the refreshed token
    Mock::given(method("GET"))
        .and(path("/v1/users/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(unauthorized_body()))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(
            "fresh-access",
            "refresh-2",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_session(&server).await;

    // Refresh succeeds, replay still 401s: surfaced as-is, no second refresh
    let result: Result<serde_json::Value, _> = client.get(routes::USERS_ME).await;
    let err = result.unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn explicit_refresh_coordinates_with_concurrent_callers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(
            "fresh-access",
            "refresh-2",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_session(&server).await;

    let mut handles = Vec::new();
    for _ in 0..3 {
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move { client.refresh_session().await }));
    }

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    assert_eq!(
        client.vault().access_token().unwrap(),
        Some("fresh-access".to_string())
    );
}
