//! Axum Middleware for Authentication and Authorization
//!
//! Authenticates requests using either:
//! - `Authorization: Bearer <JWT>` - validated against the signing secret;
//!   short-lived access tokens are trusted without a database round-trip
//! - `X-API-Key: <key>` - resolved against the api_keys table (hash lookup),
//!   which also stamps `last_used_at` and checks the owning account
//!
//! On success an `AuthContext` is injected into request extensions; handlers
//! extract it with `axum::Extension`. Admin-only routes additionally call
//! `require_admin`.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::auth::{validate_token, AuthConfig, AuthContext, AuthMethod, TokenKind};
use crate::db::DbClient;
use crate::error::{ApiError, ApiResult};

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

/// Shared state for the authentication middleware.
#[derive(Clone)]
pub struct AuthMiddlewareState {
    /// Authentication configuration
    pub auth_config: Arc<AuthConfig>,
    /// Database client for API key resolution
    pub db: DbClient,
}

impl AuthMiddlewareState {
    pub fn new(auth_config: Arc<AuthConfig>, db: DbClient) -> Self {
        Self { auth_config, db }
    }
}

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

/// Axum middleware for authentication.
///
/// 1. Extracts authentication headers (X-API-Key or Authorization: Bearer)
/// 2. Validates the credential
/// 3. Returns 401 Unauthorized if authentication fails
/// 4. Injects AuthContext into request extensions on success
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let api_key_header = request
        .headers()
        .get("x-api-key")
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned);

    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned);

    let auth_context = if let Some(api_key) = api_key_header {
        authenticate_api_key(&state.db, &api_key).await?
    } else if let Some(auth_value) = auth_header {
        let token = auth_value.strip_prefix("Bearer ").ok_or_else(|| {
            ApiError::invalid_token("Authorization header must use Bearer scheme")
        })?;
        authenticate_jwt(&state.auth_config, token)?
    } else {
        return Err(ApiError::unauthorized(
            "Authentication required: provide X-API-Key or Authorization header",
        ));
    };

    request.extensions_mut().insert(auth_context);
    Ok(next.run(request).await)
}

/// Validate an access token. No database round-trip: access tokens are
/// short-lived and carry the role claim.
pub fn authenticate_jwt(config: &AuthConfig, token: &str) -> ApiResult<AuthContext> {
    let data = validate_token(config, token, TokenKind::Access)?;
    Ok(AuthContext {
        user_id: data.user_id,
        role: data.role,
        method: AuthMethod::Jwt,
    })
}

/// Resolve an API key against the database and load the owning account.
pub async fn authenticate_api_key(db: &DbClient, api_key: &str) -> ApiResult<AuthContext> {
    let key = db
        .api_key_authenticate(api_key)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired API key"))?;

    let user = db
        .user_get(key.user_id)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| ApiError::unauthorized("API key owner is missing or deactivated"))?;

    Ok(AuthContext {
        user_id: user.id,
        role: user.role,
        method: AuthMethod::ApiKey,
    })
}

// ============================================================================
// AUTHORIZATION HELPERS
// ============================================================================

/// Reject non-admin callers with 403.
pub fn require_admin(ctx: &AuthContext) -> ApiResult<()> {
    if ctx.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Administrator role required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::FixedClock;
    use tollgate_core::{new_entity_id, UserRole};

    fn test_config() -> AuthConfig {
        AuthConfig::for_tests("middleware_test_secret", Arc::new(FixedClock(1_704_067_200)))
    }

    #[test]
    fn test_jwt_path_requires_access_token() {
        let config = test_config();
        let refresh = crate::auth::generate_token(
            &config,
            new_entity_id(),
            UserRole::User,
            TokenKind::Refresh,
        )
        .unwrap();

        assert!(authenticate_jwt(&config, &refresh).is_err());
    }

    #[test]
    fn test_require_admin() {
        let admin = AuthContext {
            user_id: new_entity_id(),
            role: UserRole::Admin,
            method: AuthMethod::Jwt,
        };
        let user = AuthContext {
            user_id: new_entity_id(),
            role: UserRole::User,
            method: AuthMethod::Jwt,
        };

        assert!(require_admin(&admin).is_ok());
        assert!(require_admin(&user).is_err());
    }
}
