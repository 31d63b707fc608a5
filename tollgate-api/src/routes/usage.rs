//! Usage History and Summary Routes
//!
//! Read-only views over the append-only usage log: paginated history and
//! aggregated summaries (totals, per-tool, per-day) for the caller.

use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::{UsageLogEntry, UsageQuery, UsageSummary};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/v1/usage - Paginated usage history
#[utoipa::path(
    get,
    path = "/api/v1/usage",
    tag = "Usage",
    params(UsageQuery),
    responses(
        (status = 200, description = "Usage history, newest first", body = [UsageLogEntry]),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn get_history(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<UsageQuery>,
) -> ApiResult<Json<Vec<UsageLogEntry>>> {
    let skip = query.skip.unwrap_or(0).max(0);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let logs = state
        .db
        .usage_history(ctx.user_id, query.start_date, query.end_date, skip, limit)
        .await?;
    Ok(Json(logs.into_iter().map(UsageLogEntry::from).collect()))
}

/// GET /api/v1/usage/summary - Aggregated usage statistics
#[utoipa::path(
    get,
    path = "/api/v1/usage/summary",
    tag = "Usage",
    params(UsageQuery),
    responses(
        (status = 200, description = "Aggregated usage", body = UsageSummary),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn get_summary(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<UsageQuery>,
) -> ApiResult<Json<UsageSummary>> {
    let summary = state
        .db
        .usage_summary(ctx.user_id, query.start_date, query.end_date)
        .await?;
    Ok(Json(summary))
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the usage routes router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_history))
        .route("/summary", get(get_summary))
}
