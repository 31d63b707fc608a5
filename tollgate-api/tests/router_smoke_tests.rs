//! Router assembly smoke tests.
//!
//! Build the full application router (lazy pool, no live database) and
//! verify the public/protected split: health and the OpenAPI document are
//! reachable anonymously, everything under the protected tree is not.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;
use tollgate_api::{
    create_api_router, ApiConfig, AppState, AuthConfig, DbClient, DbConfig, SystemClock,
};
use tollgate_invoke::{CircuitBreakerConfig, HttpToolInvoker, InvocationPipeline};

fn test_app() -> Router {
    let db = DbClient::from_config(&DbConfig::default()).unwrap();
    let pipeline = Arc::new(InvocationPipeline::new(
        Arc::new(db.clone()),
        Arc::new(db.clone()),
        Arc::new(db.clone()),
        Arc::new(HttpToolInvoker::default()),
        CircuitBreakerConfig::default(),
    ));
    let auth = AuthConfig::for_tests("router_smoke_secret", Arc::new(SystemClock));
    let state = AppState::new(db, pipeline, auth);

    create_api_router(state, &ApiConfig::default()).unwrap()
}

async fn get_status(app: Router, uri: &str) -> StatusCode {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap().status()
}

#[tokio::test]
async fn test_health_ping_is_public() {
    assert_eq!(get_status(test_app(), "/health/ping").await, StatusCode::OK);
}

#[tokio::test]
async fn test_health_live_is_public() {
    assert_eq!(get_status(test_app(), "/health/live").await, StatusCode::OK);
}

#[tokio::test]
async fn test_openapi_document_is_public() {
    assert_eq!(get_status(test_app(), "/openapi.json").await, StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_require_authentication() {
    for uri in [
        "/api/v1/tools",
        "/api/v1/subscriptions/current",
        "/api/v1/usage",
        "/api/v1/users/me",
        "/api/v1/admin/users",
    ] {
        assert_eq!(
            get_status(test_app(), uri).await,
            StatusCode::UNAUTHORIZED,
            "expected 401 for {}",
            uri
        );
    }
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    assert_eq!(
        get_status(test_app(), "/api/v1/nope").await,
        StatusCode::NOT_FOUND
    );
}
