//! Property-Based Tests for Authentication Enforcement
//!
//! For any API request, IF the request lacks a valid credential THEN the API
//! SHALL return 401 Unauthorized; IF the request carries a valid access
//! token THEN it SHALL reach the handler. Refresh tokens must never
//! authenticate a request directly.
//!
//! These tests exercise the JWT paths only: API key resolution needs the
//! database and is covered by its own unit tests. The middleware's database
//! pool is created lazily, so no live PostgreSQL is required here.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware,
    routing::get,
    Router,
};
use proptest::prelude::*;
use std::sync::Arc;
use tower::ServiceExt;
use tollgate_api::{
    auth_middleware, generate_token, AuthConfig, AuthMiddlewareState, DbClient, DbConfig,
    FixedClock, TokenKind,
};
use tollgate_core::UserRole;
use uuid::Uuid;

// ============================================================================
// TEST CONFIGURATION
// ============================================================================

/// 2024-01-01 00:00:00 UTC
const T0: i64 = 1_704_067_200;

fn test_auth_config(clock_at: i64) -> AuthConfig {
    AuthConfig::for_tests("secret_for_property_tests", Arc::new(FixedClock(clock_at)))
}

/// Create a test Axum app with the authentication middleware layered on.
fn test_app(config: AuthConfig) -> Router {
    let db = DbClient::from_config(&DbConfig::default()).unwrap();
    let state = AuthMiddlewareState::new(Arc::new(config), db);

    Router::new()
        .route("/api/v1/test", get(|| async { "Success" }))
        .layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Drive one request through the app and return the response status.
fn call(app: Router, request: Request<Body>) -> StatusCode {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    rt.block_on(async { app.oneshot(request).await.unwrap().status() })
}

fn bearer_request(token: &str) -> Request<Body> {
    Request::builder()
        .uri("/api/v1/test")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

// ============================================================================
// PROPERTY TEST STRATEGIES
// ============================================================================

fn user_id_strategy() -> impl Strategy<Value = Uuid> {
    any::<[u8; 16]>().prop_map(Uuid::from_bytes)
}

fn role_strategy() -> impl Strategy<Value = UserRole> {
    prop_oneof![Just(UserRole::User), Just(UserRole::Admin)]
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any well-signed, unexpired access token authenticates.
    #[test]
    fn prop_valid_access_tokens_accepted(
        user_id in user_id_strategy(),
        role in role_strategy(),
    ) {
        let config = test_auth_config(T0);
        let token = generate_token(&config, user_id, role, TokenKind::Access).unwrap();

        let status = call(test_app(test_auth_config(T0)), bearer_request(&token));
        prop_assert_eq!(status, StatusCode::OK);
    }

    /// Arbitrary garbage never authenticates.
    #[test]
    fn prop_garbage_tokens_rejected(token in "[A-Za-z0-9._-]{0,64}") {
        let status = call(test_app(test_auth_config(T0)), bearer_request(&token));
        prop_assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    /// Refresh tokens never authenticate a request directly.
    #[test]
    fn prop_refresh_tokens_rejected(
        user_id in user_id_strategy(),
        role in role_strategy(),
    ) {
        let config = test_auth_config(T0);
        let token = generate_token(&config, user_id, role, TokenKind::Refresh).unwrap();

        let status = call(test_app(test_auth_config(T0)), bearer_request(&token));
        prop_assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

// ============================================================================
// FIXED CASES
// ============================================================================

#[tokio::test]
async fn test_missing_credentials_rejected() {
    let app = test_app(test_auth_config(T0));
    let request = Request::builder()
        .uri("/api/v1/test")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_bearer_authorization_rejected() {
    let app = test_app(test_auth_config(T0));
    let request = Request::builder()
        .uri("/api/v1/test")
        .header("authorization", "Basic dXNlcjpwYXNz")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_access_token_rejected() {
    // Issued at T0, validated a year later.
    let issuing = test_auth_config(T0);
    let token = generate_token(
        &issuing,
        Uuid::new_v4(),
        UserRole::User,
        TokenKind::Access,
    )
    .unwrap();

    let app = test_app(test_auth_config(T0 + 365 * 86_400));
    let response = app.oneshot(bearer_request(&token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
