//! REST API Routes Module
//!
//! All REST route handlers, organized by resource:
//! - auth (register/login/refresh/logout - public)
//! - users, tools, subscriptions, usage, admin (authenticated)
//! - health checks (public, Kubernetes-compatible)
//! - /openapi.json document
//!
//! CORS is configured from `ApiConfig`; authenticated routers share one
//! auth-middleware layer.

pub mod admin;
pub mod auth;
pub mod health;
pub mod subscription;
pub mod tool;
pub mod usage;
pub mod user;

use std::time::Duration;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{auth_middleware, AuthMiddlewareState};
use crate::openapi::ApiDoc;
use crate::state::AppState;

// Re-export route creation functions for convenience
pub use admin::create_router as admin_router;
pub use auth::create_router as auth_router;
pub use health::create_router as health_router;
pub use subscription::create_router as subscription_router;
pub use tool::create_router as tool_router;
pub use usage::create_router as usage_router;
pub use user::create_router as user_router;

// ============================================================================
// OPENAPI ENDPOINT
// ============================================================================

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// ROUTER ASSEMBLY
// ============================================================================

/// Create the complete API router.
pub fn create_api_router(state: AppState, api_config: &ApiConfig) -> ApiResult<Router> {
    let auth_state = AuthMiddlewareState::new(state.auth.clone(), state.db.clone());

    let protected = Router::new()
        .nest("/users", user_router())
        .nest("/tools", tool_router())
        .nest("/subscriptions", subscription_router())
        .nest("/usage", usage_router())
        .nest("/admin", admin_router())
        .layer(from_fn_with_state(auth_state, auth_middleware));

    let api_v1 = Router::new().nest("/auth", auth_router()).merge(protected);

    let router = Router::new()
        .nest("/api/v1", api_v1)
        .nest("/health", health_router())
        .route("/openapi.json", get(openapi_json))
        .layer(build_cors_layer(api_config)?)
        .with_state(state);

    Ok(router)
}

/// Build the CORS layer from configuration.
///
/// Empty origin list = development mode (allow all, no credentials).
/// `allow_credentials` only takes effect with an explicit origin list -
/// tower-http rejects credentials combined with a wildcard origin.
fn build_cors_layer(config: &ApiConfig) -> ApiResult<CorsLayer> {
    let mut layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-api-key"),
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        layer = layer.allow_origin(Any);
    } else {
        let origins = config
            .cors_origins
            .iter()
            .map(|origin| {
                origin.parse::<HeaderValue>().map_err(|_| {
                    ApiError::invalid_input(format!("Invalid CORS origin: {}", origin))
                })
            })
            .collect::<ApiResult<Vec<_>>>()?;
        layer = layer.allow_origin(AllowOrigin::list(origins));

        if config.cors_allow_credentials {
            layer = layer.allow_credentials(true);
        }
    }

    Ok(layer)
}
