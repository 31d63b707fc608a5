//! Authentication Module
//!
//! This module provides authentication primitives for the Tollgate API:
//! 1. JWT access/refresh token issuance and validation (HS256)
//! 2. Password hashing (bcrypt)
//! 3. API key generation and hashing (SHA-256, prefix kept for listings)
//!
//! Refresh tokens are JWTs too, but they only authenticate through the
//! rotation flow: the API stores their SHA-256 hash and refuses revoked or
//! replaced tokens (see routes::auth).

use crate::error::{ApiError, ApiResult};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tollgate_core::{EntityId, UserRole};
use uuid::Uuid;

// ============================================================================
// CLOCK ABSTRACTION (FOR DETERMINISTIC TESTS)
// ============================================================================

/// Clock abstraction for JWT time validation.
///
/// Owning expiry validation (instead of letting `jsonwebtoken` read the
/// system clock) keeps token tests fully deterministic.
pub trait JwtClock: Send + Sync {
    /// Get current time as Unix epoch seconds.
    fn now_epoch_secs(&self) -> i64;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl JwtClock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl JwtClock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}

// ============================================================================
// JWT SECRET (TYPE-SAFE)
// ============================================================================

/// Type-safe JWT secret that prevents accidental logging.
#[derive(Clone)]
pub struct JwtSecret(SecretString);

impl JwtSecret {
    /// Create a new JWT secret with validation.
    ///
    /// # Errors
    /// Returns error if the secret is shorter than 16 characters.
    pub fn new(secret: String) -> ApiResult<Self> {
        if secret.len() < 16 {
            return Err(ApiError::invalid_input(
                "JWT secret must be at least 16 characters",
            ));
        }
        Ok(Self(SecretString::new(secret.into())))
    }

    /// Expose the secret value (use sparingly, only for signing/verification).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JwtSecret([REDACTED, {} chars])", self.0.expose_secret().len())
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Authentication configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// Secret used to sign and verify tokens.
    pub jwt_secret: JwtSecret,
    /// Access token lifetime in minutes.
    pub access_token_expire_minutes: i64,
    /// Refresh token lifetime in days.
    pub refresh_token_expire_days: i64,
    /// Clock used for issuing and validating token timestamps.
    pub clock: Arc<dyn JwtClock>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret)
            .field("access_token_expire_minutes", &self.access_token_expire_minutes)
            .field("refresh_token_expire_days", &self.refresh_token_expire_days)
            .finish()
    }
}

impl AuthConfig {
    /// Create AuthConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `TOLLGATE_JWT_SECRET`: Signing secret, minimum 16 characters (required)
    /// - `TOLLGATE_ACCESS_TOKEN_EXPIRE_MINUTES`: Access token lifetime (default: 30)
    /// - `TOLLGATE_REFRESH_TOKEN_EXPIRE_DAYS`: Refresh token lifetime (default: 7)
    pub fn from_env() -> ApiResult<Self> {
        let secret = std::env::var("TOLLGATE_JWT_SECRET")
            .map_err(|_| ApiError::internal_error("TOLLGATE_JWT_SECRET is not set"))?;

        let access_token_expire_minutes = std::env::var("TOLLGATE_ACCESS_TOKEN_EXPIRE_MINUTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let refresh_token_expire_days = std::env::var("TOLLGATE_REFRESH_TOKEN_EXPIRE_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(7);

        Ok(Self {
            jwt_secret: JwtSecret::new(secret)?,
            access_token_expire_minutes,
            refresh_token_expire_days,
            clock: Arc::new(SystemClock),
        })
    }

    /// Config with a fixed secret and clock, for tests.
    pub fn for_tests(secret: &str, clock: Arc<dyn JwtClock>) -> Self {
        Self {
            jwt_secret: JwtSecret(SecretString::new(secret.to_string().into())),
            access_token_expire_minutes: 30,
            refresh_token_expire_days: 7,
            clock,
        }
    }
}

// ============================================================================
// TOKEN ISSUANCE AND VALIDATION
// ============================================================================

/// Which kind of JWT a token claims to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// JWT claims carried by Tollgate tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: String,
    /// The user's role at issuance time.
    pub role: String,
    /// Token kind discriminator ("access" or "refresh").
    pub typ: String,
    /// Issued-at, Unix epoch seconds.
    pub iat: i64,
    /// Expiry, Unix epoch seconds.
    pub exp: i64,
}

/// Validated identity extracted from a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenData {
    pub user_id: EntityId,
    pub role: UserRole,
}

/// Issue a token of `kind` for `user_id`.
pub fn generate_token(
    config: &AuthConfig,
    user_id: EntityId,
    role: UserRole,
    kind: TokenKind,
) -> ApiResult<String> {
    let now = config.clock.now_epoch_secs();
    let lifetime_secs = match kind {
        TokenKind::Access => config.access_token_expire_minutes * 60,
        TokenKind::Refresh => config.refresh_token_expire_days * 86_400,
    };

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.as_db_str().to_string(),
        typ: kind.as_str().to_string(),
        iat: now,
        exp: now + lifetime_secs,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.expose().as_bytes()),
    )
    .map_err(|e| ApiError::internal_error(format!("Failed to sign token: {}", e)))
}

/// Validate a token of the expected kind and extract its identity.
///
/// Signature verification comes from `jsonwebtoken`; expiry is checked
/// against the configured clock (deterministic in tests).
pub fn validate_token(
    config: &AuthConfig,
    token: &str,
    expected_kind: TokenKind,
) -> ApiResult<TokenData> {
    // Decode with signature validation only; expiry is checked below against
    // the injected clock. Keep "exp" required so it must be present.
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.required_spec_claims = std::collections::HashSet::from(["exp".to_string()]);

    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.expose().as_bytes()),
        &validation,
    )
    .map_err(|e| ApiError::invalid_token(format!("Invalid token: {}", e)))?;

    let claims = decoded.claims;

    if claims.typ != expected_kind.as_str() {
        return Err(ApiError::invalid_token(format!(
            "Expected {} token, got {}",
            expected_kind.as_str(),
            claims.typ
        )));
    }

    if claims.exp <= config.clock.now_epoch_secs() {
        return Err(ApiError::token_expired());
    }

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::invalid_token("Token subject is not a valid user id"))?;
    let role = UserRole::from_db_str(&claims.role)
        .map_err(|_| ApiError::invalid_token("Token carries an unknown role"))?;

    Ok(TokenData { user_id, role })
}

// ============================================================================
// PASSWORD HASHING
// ============================================================================

/// Hash a password with bcrypt.
pub fn hash_password(password: &str) -> ApiResult<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::internal_error(format!("Password hashing failed: {}", e)))
}

/// Verify a plain password against its bcrypt hash.
///
/// A malformed stored hash verifies as false rather than erroring: the
/// caller cannot distinguish it from a wrong password, which is the point.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    bcrypt::verify(password, password_hash).unwrap_or(false)
}

// ============================================================================
// API KEYS AND OPAQUE TOKEN HASHING
// ============================================================================

/// Length of the plaintext prefix stored for API key listings.
pub const API_KEY_PREFIX_LEN: usize = 8;

/// A freshly generated API key, before hashing.
#[derive(Debug, Clone)]
pub struct GeneratedApiKey {
    /// Full plaintext key; shown to the user exactly once.
    pub plaintext: String,
    /// First characters of the plaintext, stored for identification.
    pub prefix: String,
    /// SHA-256 hex digest stored in place of the key.
    pub hash: String,
}

/// Generate a new API key with the `tg_` prefix.
pub fn generate_api_key() -> GeneratedApiKey {
    use rand::RngCore;

    let mut bytes = [0u8; 24];
    rand::rng().fill_bytes(&mut bytes);
    let plaintext = format!("tg_{}", hex::encode(bytes));
    let prefix = plaintext[..API_KEY_PREFIX_LEN].to_string();
    let hash = sha256_hex(&plaintext);

    GeneratedApiKey {
        plaintext,
        prefix,
        hash,
    }
}

/// SHA-256 hex digest of an opaque credential (API key or refresh token).
pub fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

// ============================================================================
// AUTH CONTEXT
// ============================================================================

/// How a request authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Jwt,
    ApiKey,
}

/// Authenticated identity injected into request extensions by the middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: EntityId,
    pub role: UserRole,
    pub method: AuthMethod,
}

impl AuthContext {
    /// Whether this request may access admin-only routes.
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_core::new_entity_id;

    /// 2024-01-01 00:00:00 UTC
    const T0: i64 = 1_704_067_200;

    fn test_config(clock_at: i64) -> AuthConfig {
        AuthConfig::for_tests("test_secret_for_auth_tests", Arc::new(FixedClock(clock_at)))
    }

    #[test]
    fn test_token_roundtrip() {
        let config = test_config(T0);
        let user_id = new_entity_id();

        let token = generate_token(&config, user_id, UserRole::User, TokenKind::Access).unwrap();
        let data = validate_token(&config, &token, TokenKind::Access).unwrap();

        assert_eq!(data.user_id, user_id);
        assert_eq!(data.role, UserRole::User);
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let config = test_config(T0);
        let token =
            generate_token(&config, new_entity_id(), UserRole::User, TokenKind::Refresh).unwrap();

        let err = validate_token(&config, &token, TokenKind::Access).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidToken);
    }

    #[test]
    fn test_expired_token_rejected() {
        let issued = test_config(T0);
        let token =
            generate_token(&issued, new_entity_id(), UserRole::User, TokenKind::Access).unwrap();

        // Same secret, clock one year later.
        let later = test_config(T0 + 365 * 86_400);
        let err = validate_token(&later, &token, TokenKind::Access).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::TokenExpired);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let config = test_config(T0);
        let token =
            generate_token(&config, new_entity_id(), UserRole::Admin, TokenKind::Access).unwrap();

        let other = AuthConfig::for_tests("another_secret_entirely", Arc::new(FixedClock(T0)));
        assert!(validate_token(&other, &token, TokenKind::Access).is_err());
    }

    #[test]
    fn test_password_hash_verify() {
        let hash = hash_password("hunter2hunter2").unwrap();
        assert!(verify_password("hunter2hunter2", &hash));
        assert!(!verify_password("wrong-password", &hash));
        assert!(!verify_password("hunter2hunter2", "not-a-bcrypt-hash"));
    }

    #[test]
    fn test_api_key_generation() {
        let key = generate_api_key();
        assert!(key.plaintext.starts_with("tg_"));
        assert_eq!(key.prefix.len(), API_KEY_PREFIX_LEN);
        assert_eq!(key.hash, sha256_hex(&key.plaintext));

        // Two keys never collide.
        let other = generate_api_key();
        assert_ne!(key.plaintext, other.plaintext);
    }

    #[test]
    fn test_jwt_secret_redacted_in_debug() {
        let secret = JwtSecret::new("0123456789abcdef".to_string()).unwrap();
        let debug = format!("{:?}", secret);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("0123456789abcdef"));
    }
}
