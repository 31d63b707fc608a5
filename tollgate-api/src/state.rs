//! Shared application state for Axum routers.

use std::sync::Arc;

use tollgate_invoke::InvocationPipeline;

use crate::auth::AuthConfig;
use crate::db::DbClient;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Database client.
    pub db: DbClient,
    /// Tool-invocation pipeline (owns the breaker registry).
    pub pipeline: Arc<InvocationPipeline>,
    /// Authentication configuration (token issuance in auth routes).
    pub auth: Arc<AuthConfig>,
    /// Process start, for health uptime reporting.
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(db: DbClient, pipeline: Arc<InvocationPipeline>, auth: AuthConfig) -> Self {
        Self {
            db,
            pipeline,
            auth: Arc::new(auth),
            start_time: std::time::Instant::now(),
        }
    }
}

// Use macro to reduce boilerplate for FromRef implementations
crate::impl_from_ref!(DbClient, db);
crate::impl_from_ref!(Arc<InvocationPipeline>, pipeline);
crate::impl_from_ref!(Arc<AuthConfig>, auth);
crate::impl_from_ref!(std::time::Instant, start_time);
