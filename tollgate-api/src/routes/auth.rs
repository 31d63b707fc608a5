//! Authentication REST API Routes
//!
//! Register, login, refresh and logout. Refresh tokens rotate: each refresh
//! revokes the presented token and records its successor (`replaced_by`), so
//! a stolen older token in the chain is dead on arrival.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use chrono::{Duration, Utc};

use crate::auth::{generate_token, hash_password, sha256_hex, verify_password, TokenKind};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::{
    LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest, TokenPair, UserProfile,
};
use tollgate_core::{EntityId, RefreshToken, User, UserRole};

/// Minimum accepted password length.
const MIN_PASSWORD_LEN: usize = 8;

// ============================================================================
// HELPERS
// ============================================================================

fn validate_registration(req: &RegisterRequest) -> ApiResult<()> {
    if req.name.trim().is_empty() {
        return Err(ApiError::missing_field("name"));
    }
    if !req.email.contains('@') {
        return Err(ApiError::validation_failed("Invalid email address"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation_failed(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Issue an access/refresh pair and persist the refresh token's hash.
async fn issue_token_pair(
    state: &AppState,
    user_id: EntityId,
    role: UserRole,
) -> ApiResult<(TokenPair, EntityId)> {
    let access_token = generate_token(&state.auth, user_id, role, TokenKind::Access)?;
    let refresh_token = generate_token(&state.auth, user_id, role, TokenKind::Refresh)?;

    let now = Utc::now();
    let record = RefreshToken::new(
        user_id,
        sha256_hex(&refresh_token),
        now + Duration::days(state.auth.refresh_token_expire_days),
        now,
    );
    let record_id = record.id;
    state.db.refresh_token_insert(&record).await?;

    Ok((
        TokenPair {
            access_token,
            refresh_token,
        },
        record_id,
    ))
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/v1/auth/register - Create a new account
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = UserProfile),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 409, description = "Email already registered", body = ApiError),
    ),
)]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_registration(&req)?;

    if state.db.user_get_by_email(&req.email).await?.is_some() {
        return Err(ApiError::entity_already_exists("User", &req.email));
    }

    let password_hash = hash_password(&req.password)?;
    let user = User::new(req.name.trim(), req.email.trim(), password_hash, Utc::now());
    state.db.user_insert(&user).await?;

    tracing::info!(user_id = %user.id, "registered new user");
    Ok((StatusCode::CREATED, Json(UserProfile::from(user))))
}

/// POST /api/v1/auth/login - Exchange credentials for a token pair
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = TokenPair),
        (status = 401, description = "Incorrect email or password", body = ApiError),
    ),
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenPair>> {
    let user = state.db.user_get_by_email(&req.email).await?;

    // One rejection message for both unknown email and wrong password.
    let user = user
        .filter(|u| u.is_active && verify_password(&req.password, &u.password_hash))
        .ok_or_else(|| ApiError::unauthorized("Incorrect email or password"))?;

    let (pair, _) = issue_token_pair(&state, user.id, user.role).await?;
    Ok(Json(pair))
}

/// POST /api/v1/auth/refresh - Rotate a refresh token
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "Auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Refresh token invalid, revoked or expired", body = ApiError),
    ),
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    let data = crate::auth::validate_token(&state.auth, &req.refresh_token, TokenKind::Refresh)?;

    let record = state
        .db
        .refresh_token_find_by_hash(&sha256_hex(&req.refresh_token))
        .await?
        .ok_or_else(|| ApiError::unauthorized("Refresh token is not recognized"))?;

    if !record.is_usable_at(Utc::now()) {
        return Err(ApiError::unauthorized(
            "Refresh token has been revoked or has expired",
        ));
    }

    let (pair, new_record_id) = issue_token_pair(&state, data.user_id, data.role).await?;
    state
        .db
        .refresh_token_revoke(record.id, Some(new_record_id))
        .await?;

    Ok(Json(pair))
}

/// POST /api/v1/auth/logout - Revoke a refresh token
///
/// Possession of the refresh token is the proof of identity here; the access
/// token may already have expired when a client logs out.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "Auth",
    request_body = LogoutRequest,
    responses(
        (status = 204, description = "Refresh token revoked"),
        (status = 401, description = "Unknown refresh token", body = ApiError),
    ),
)]
pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<LogoutRequest>,
) -> ApiResult<impl IntoResponse> {
    let record = state
        .db
        .refresh_token_find_by_hash(&sha256_hex(&req.refresh_token))
        .await?
        .ok_or_else(|| ApiError::unauthorized("Refresh token is not recognized"))?;

    state.db.refresh_token_revoke(record.id, None).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the auth routes router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_registration_validation() {
        assert!(validate_registration(&request("Ada", "ada@example.com", "longenough")).is_ok());
        assert!(validate_registration(&request("", "ada@example.com", "longenough")).is_err());
        assert!(validate_registration(&request("Ada", "not-an-email", "longenough")).is_err());
        assert!(validate_registration(&request("Ada", "ada@example.com", "short")).is_err());
    }
}
