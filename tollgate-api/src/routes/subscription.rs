//! Subscription Routes
//!
//! Plan listing and the subscribe/cancel lifecycle. One subscription row per
//! user: subscribing again overwrites the row in place and resets the
//! consumed-token counter.

use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::{SubscribeRequest, SubscriptionDetail, SubscriptionPlanInfo};
use tollgate_core::{Subscription, SubscriptionPlan, SubscriptionStatus};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/v1/subscriptions/plans - Available plans
#[utoipa::path(
    get,
    path = "/api/v1/subscriptions/plans",
    tag = "Subscriptions",
    responses(
        (status = 200, description = "Available plans", body = [SubscriptionPlanInfo]),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn list_plans() -> Json<Vec<SubscriptionPlanInfo>> {
    Json(
        [
            SubscriptionPlan::Free,
            SubscriptionPlan::Pro,
            SubscriptionPlan::Enterprise,
        ]
        .into_iter()
        .map(SubscriptionPlanInfo::for_plan)
        .collect(),
    )
}

/// GET /api/v1/subscriptions/current - The caller's subscription
#[utoipa::path(
    get,
    path = "/api/v1/subscriptions/current",
    tag = "Subscriptions",
    responses(
        (status = 200, description = "Current subscription", body = SubscriptionDetail),
        (status = 404, description = "No subscription", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn get_current(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<SubscriptionDetail>> {
    let subscription = state
        .db
        .subscription_get(ctx.user_id)
        .await?
        .ok_or_else(ApiError::subscription_not_found)?;
    Ok(Json(SubscriptionDetail::from(subscription)))
}

/// POST /api/v1/subscriptions/subscribe - Subscribe or switch plan
#[utoipa::path(
    post,
    path = "/api/v1/subscriptions/subscribe",
    tag = "Subscriptions",
    request_body = SubscribeRequest,
    responses(
        (status = 200, description = "Subscription in effect", body = SubscriptionDetail),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn subscribe(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<SubscribeRequest>,
) -> ApiResult<Json<SubscriptionDetail>> {
    let now = Utc::now();

    // Overwrite-in-place semantics: keep the existing row id where present,
    // reset the counter either way.
    let subscription = match state.db.subscription_get(ctx.user_id).await? {
        Some(mut existing) => {
            existing.renew(req.plan, now);
            existing
        }
        None => Subscription::new(ctx.user_id, req.plan, now),
    };

    let stored = state.db.subscription_upsert(&subscription).await?;
    tracing::info!(user_id = %ctx.user_id, plan = stored.plan.as_db_str(), "subscription updated");
    Ok(Json(SubscriptionDetail::from(stored)))
}

/// POST /api/v1/subscriptions/cancel - Cancel the caller's subscription
#[utoipa::path(
    post,
    path = "/api/v1/subscriptions/cancel",
    tag = "Subscriptions",
    responses(
        (status = 200, description = "Cancelled subscription", body = SubscriptionDetail),
        (status = 404, description = "No subscription", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn cancel(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<SubscriptionDetail>> {
    let subscription = state
        .db
        .subscription_set_status(ctx.user_id, SubscriptionStatus::Cancelled)
        .await?
        .ok_or_else(ApiError::subscription_not_found)?;
    Ok(Json(SubscriptionDetail::from(subscription)))
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the subscription routes router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/plans", get(list_plans))
        .route("/current", get(get_current))
        .route("/subscribe", post(subscribe))
        .route("/cancel", post(cancel))
}
