//! Tool Catalog and Invocation Routes
//!
//! Listing and detail reads of the catalog, plus the invocation entry point.
//! Invocation always answers 200 with the uniform outcome shape
//! (`success/result/error/duration_ms`); rejection reasons surface in the
//! `error` field rather than as HTTP status codes.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::{Pagination, ToolDetail, ToolInvocationRequest, ToolSummary};
use tollgate_core::{CallerIdentity, EntityId};
use tollgate_invoke::{InvocationOutcome, InvocationPipeline};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/v1/tools - List active tools
#[utoipa::path(
    get,
    path = "/api/v1/tools",
    tag = "Tools",
    params(Pagination),
    responses(
        (status = 200, description = "Active tools", body = [ToolSummary]),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn list_tools(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<Vec<ToolSummary>>> {
    let (skip, limit) = pagination.clamped();
    let tools = state.db.tool_list(skip, limit, true).await?;
    Ok(Json(tools.into_iter().map(ToolSummary::from).collect()))
}

/// GET /api/v1/tools/{id} - Tool details
#[utoipa::path(
    get,
    path = "/api/v1/tools/{id}",
    tag = "Tools",
    params(("id" = uuid::Uuid, Path, description = "Tool id")),
    responses(
        (status = 200, description = "Tool details", body = ToolDetail),
        (status = 404, description = "Tool not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn get_tool(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> ApiResult<Json<ToolDetail>> {
    let tool = state
        .db
        .tool_get(id)
        .await?
        .ok_or_else(|| ApiError::tool_not_found(id))?;
    Ok(Json(ToolDetail::from(tool)))
}

/// POST /api/v1/tools/{id}/invoke - Invoke a tool
///
/// The metered path: subscription and quota guards, breaker-gated external
/// call, usage recording. Always 200; inspect `success` and `error`.
#[utoipa::path(
    post,
    path = "/api/v1/tools/{id}/invoke",
    tag = "Tools",
    params(("id" = uuid::Uuid, Path, description = "Tool id")),
    request_body = ToolInvocationRequest,
    responses(
        (status = 200, description = "Invocation outcome", body = InvocationOutcome),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn invoke_tool(
    State(pipeline): State<Arc<InvocationPipeline>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<EntityId>,
    Json(req): Json<ToolInvocationRequest>,
) -> Json<InvocationOutcome> {
    // Run the pipeline in a detached task: if the client disconnects, axum
    // drops this handler future, but the in-flight external call must still
    // complete and its usage row must still be written.
    let caller = CallerIdentity::new(ctx.user_id);
    let task = tokio::spawn(async move { pipeline.invoke_tool(caller, id, req.input).await });

    match task.await {
        Ok(outcome) => Json(outcome),
        Err(join_err) => {
            tracing::error!(error = %join_err, tool_id = %id, "invocation task aborted");
            Json(InvocationOutcome {
                success: false,
                result: None,
                error: Some("Tool invocation failed unexpectedly".to_string()),
                duration_ms: None,
            })
        }
    }
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the tool routes router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tools))
        .route("/:id", get(get_tool))
        .route("/:id/invoke", post(invoke_tool))
}
