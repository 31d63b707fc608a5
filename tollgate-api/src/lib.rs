//! Tollgate API - REST API Layer
//!
//! This crate provides the HTTP surface of the Tollgate tool-metering
//! platform: JWT/API-key authentication, the tool catalog and invocation
//! endpoint, subscription lifecycle, usage reporting, and administration.
//!
//! Persistent storage is PostgreSQL (deadpool-postgres); the invocation
//! pipeline itself lives in tollgate-invoke and is wired up here with the
//! database-backed collaborator implementations.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod macros;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use auth::{
    generate_api_key, generate_token, hash_password, sha256_hex, validate_token, verify_password,
    AuthConfig, AuthContext, AuthMethod, Claims, FixedClock, JwtClock, JwtSecret, SystemClock,
    TokenKind,
};
pub use config::ApiConfig;
pub use db::{DbClient, DbConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{auth_middleware, require_admin, AuthMiddlewareState};
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use state::AppState;
pub use telemetry::{init_telemetry, TelemetryConfig};
