//! Admin Routes
//!
//! Platform administration: user listing, tool catalog management, and
//! platform-wide usage statistics. Every handler requires the `admin` role
//! on top of authentication.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::middleware::require_admin;
use crate::state::AppState;
use crate::types::{
    CreateToolRequest, Pagination, PlatformUsageStats, ToolDetail, UpdateToolRequest, UserProfile,
};
use tollgate_core::{EntityId, Tool};

// ============================================================================
// USER ADMINISTRATION
// ============================================================================

/// GET /api/v1/admin/users - List all users
#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    tag = "Admin",
    params(Pagination),
    responses(
        (status = 200, description = "Users", body = [UserProfile]),
        (status = 403, description = "Admin role required", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<Vec<UserProfile>>> {
    require_admin(&ctx)?;
    let (skip, limit) = pagination.clamped();
    let users = state.db.user_list(skip, limit).await?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

// ============================================================================
// TOOL ADMINISTRATION
// ============================================================================

/// POST /api/v1/admin/tools - Register a new tool
#[utoipa::path(
    post,
    path = "/api/v1/admin/tools",
    tag = "Admin",
    request_body = CreateToolRequest,
    responses(
        (status = 201, description = "Tool created", body = ToolDetail),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 403, description = "Admin role required", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn create_tool(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<CreateToolRequest>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&ctx)?;

    if req.name.trim().is_empty() {
        return Err(ApiError::missing_field("name"));
    }
    if !req.api_endpoint.starts_with("http://") && !req.api_endpoint.starts_with("https://") {
        return Err(ApiError::validation_failed(
            "api_endpoint must be an http(s) URL",
        ));
    }

    let tool = Tool::new(
        req.name.trim(),
        req.description,
        req.api_endpoint,
        req.is_active,
        Utc::now(),
    );
    state.db.tool_insert(&tool).await?;

    tracing::info!(tool_id = %tool.id, "registered tool");
    Ok((StatusCode::CREATED, Json(ToolDetail::from(tool))))
}

/// PUT /api/v1/admin/tools/{id} - Update a tool
#[utoipa::path(
    put,
    path = "/api/v1/admin/tools/{id}",
    tag = "Admin",
    params(("id" = uuid::Uuid, Path, description = "Tool id")),
    request_body = UpdateToolRequest,
    responses(
        (status = 200, description = "Updated tool", body = ToolDetail),
        (status = 404, description = "Tool not found", body = ApiError),
        (status = 403, description = "Admin role required", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn update_tool(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<EntityId>,
    Json(req): Json<UpdateToolRequest>,
) -> ApiResult<Json<ToolDetail>> {
    require_admin(&ctx)?;

    let tool = state
        .db
        .tool_update(
            id,
            req.name.as_deref(),
            req.description.as_deref(),
            req.api_endpoint.as_deref(),
            req.is_active,
        )
        .await?
        .ok_or_else(|| ApiError::tool_not_found(id))?;
    Ok(Json(ToolDetail::from(tool)))
}

/// DELETE /api/v1/admin/tools/{id} - Delete a tool
#[utoipa::path(
    delete,
    path = "/api/v1/admin/tools/{id}",
    tag = "Admin",
    params(("id" = uuid::Uuid, Path, description = "Tool id")),
    responses(
        (status = 204, description = "Tool deleted"),
        (status = 404, description = "Tool not found", body = ApiError),
        (status = 403, description = "Admin role required", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn delete_tool(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<EntityId>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&ctx)?;

    let deleted = state.db.tool_delete(id).await?;
    if !deleted {
        return Err(ApiError::tool_not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// PLATFORM STATISTICS
// ============================================================================

/// GET /api/v1/admin/usage/stats - Platform-wide usage statistics
#[utoipa::path(
    get,
    path = "/api/v1/admin/usage/stats",
    tag = "Admin",
    responses(
        (status = 200, description = "Platform statistics", body = PlatformUsageStats),
        (status = 403, description = "Admin role required", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn platform_stats(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<PlatformUsageStats>> {
    require_admin(&ctx)?;

    let stats = PlatformUsageStats {
        total_users: state.db.user_count().await?,
        active_subscriptions: state.db.subscription_active_count().await?,
        total_tools: state.db.tool_count().await?,
        total_usage_logs: state.db.usage_count().await?,
        usage_by_tool: state.db.platform_usage_by_tool().await?,
        usage_by_day: state.db.platform_usage_by_day().await?,
    };
    Ok(Json(stats))
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the admin routes router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/tools", post(create_tool))
        .route("/tools/:id", put(update_tool).delete(delete_tool))
        .route("/usage/stats", get(platform_stats))
}
