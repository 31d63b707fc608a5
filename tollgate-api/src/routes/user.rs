//! User Profile and API Key Routes
//!
//! Self-service operations on the authenticated account: profile read and
//! update, plus API key lifecycle. The plaintext API key is returned exactly
//! once at creation; afterwards only the prefix identifies it.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Extension, Json, Router,
};
use chrono::Utc;

use crate::auth::{generate_api_key, hash_password, AuthContext};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::{ApiKeyCreated, ApiKeyInfo, CreateApiKeyRequest, UpdateProfileRequest, UserProfile};
use tollgate_core::{ApiKey, EntityId};

// ============================================================================
// PROFILE HANDLERS
// ============================================================================

/// GET /api/v1/users/me - Current user's profile
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<UserProfile>> {
    let user = state
        .db
        .user_get(ctx.user_id)
        .await?
        .ok_or_else(|| ApiError::user_not_found(ctx.user_id))?;
    Ok(Json(UserProfile::from(user)))
}

/// PUT /api/v1/users/me - Update name and/or password
#[utoipa::path(
    put,
    path = "/api/v1/users/me",
    tag = "Users",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserProfile),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<UserProfile>> {
    if let Some(name) = &req.name {
        if name.trim().is_empty() {
            return Err(ApiError::validation_failed("Name must not be empty"));
        }
    }

    let password_hash = match &req.password {
        Some(password) if password.len() < 8 => {
            return Err(ApiError::validation_failed(
                "Password must be at least 8 characters",
            ));
        }
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let user = state
        .db
        .user_update_profile(ctx.user_id, req.name.as_deref(), password_hash.as_deref())
        .await?
        .ok_or_else(|| ApiError::user_not_found(ctx.user_id))?;

    Ok(Json(UserProfile::from(user)))
}

// ============================================================================
// API KEY HANDLERS
// ============================================================================

/// GET /api/v1/users/me/api-keys - List the caller's API keys
#[utoipa::path(
    get,
    path = "/api/v1/users/me/api-keys",
    tag = "Users",
    responses(
        (status = 200, description = "API keys", body = [ApiKeyInfo]),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn list_api_keys(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<ApiKeyInfo>>> {
    let keys = state.db.api_key_list(ctx.user_id).await?;
    Ok(Json(keys.into_iter().map(ApiKeyInfo::from).collect()))
}

/// POST /api/v1/users/me/api-keys - Create an API key
#[utoipa::path(
    post,
    path = "/api/v1/users/me/api-keys",
    tag = "Users",
    request_body = CreateApiKeyRequest,
    responses(
        (status = 201, description = "Key created; plaintext returned once", body = ApiKeyCreated),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn create_api_key(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<CreateApiKeyRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.name.trim().is_empty() {
        return Err(ApiError::missing_field("name"));
    }

    let generated = generate_api_key();
    let key = ApiKey::new(
        ctx.user_id,
        generated.hash,
        generated.prefix,
        req.name.trim(),
        req.expires_at,
        Utc::now(),
    );
    state.db.api_key_insert(&key).await?;

    tracing::info!(user_id = %ctx.user_id, key_id = %key.id, "created API key");
    Ok((
        StatusCode::CREATED,
        Json(ApiKeyCreated {
            key: generated.plaintext,
            info: ApiKeyInfo::from(key),
        }),
    ))
}

/// DELETE /api/v1/users/me/api-keys/{key_id} - Deactivate an API key
#[utoipa::path(
    delete,
    path = "/api/v1/users/me/api-keys/{key_id}",
    tag = "Users",
    params(("key_id" = uuid::Uuid, Path, description = "API key id")),
    responses(
        (status = 204, description = "Key deactivated"),
        (status = 404, description = "Key not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn delete_api_key(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(key_id): Path<EntityId>,
) -> ApiResult<impl IntoResponse> {
    let deactivated = state.db.api_key_deactivate(ctx.user_id, key_id).await?;
    if !deactivated {
        return Err(ApiError::api_key_not_found(key_id));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the user routes router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_profile))
        .route("/me", put(update_profile))
        .route(
            "/me/api-keys",
            get(list_api_keys).post(create_api_key),
        )
        .route(
            "/me/api-keys/:key_id",
            axum::routing::delete(delete_api_key),
        )
}
