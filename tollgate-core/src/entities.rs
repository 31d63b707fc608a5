//! Entity definitions for the Tollgate platform.
//!
//! These structs mirror the persistent schema one-to-one. Constructors fill
//! in generated ids and timestamps; lifecycle rules (re-subscribe resets the
//! counter, paid plans expire after 30 days) live here so every storage
//! backend applies them identically.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::{SubscriptionPlan, SubscriptionStatus, UsageResponseStatus, UserRole};
use crate::{new_entity_id, EntityId, Timestamp};

/// Number of days a paid subscription stays valid before renewal.
pub const PAID_PLAN_VALIDITY_DAYS: i64 = 30;

// ============================================================================
// USER
// ============================================================================

/// A registered account.
///
/// `password_hash` is a bcrypt hash; the API layer is the only writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    /// Create a new user with the `User` role.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            role: UserRole::User,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Minimal caller identity handed to the invocation pipeline.
///
/// The pipeline never needs the full user entity; passing only the id keeps
/// it decoupled from account fields and makes the contract explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub id: EntityId,
}

impl CallerIdentity {
    pub fn new(id: EntityId) -> Self {
        Self { id }
    }
}

impl From<&User> for CallerIdentity {
    fn from(user: &User) -> Self {
        Self { id: user.id }
    }
}

// ============================================================================
// TOOL
// ============================================================================

/// A registered external HTTP capability users can invoke.
///
/// Referenced (never owned) by usage logs; mutated only through admin
/// operations. Invocation requires `is_active == true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Tool {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: EntityId,
    pub name: String,
    pub description: String,
    pub api_endpoint: String,
    pub is_active: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        api_endpoint: impl Into<String>,
        is_active: bool,
        now: Timestamp,
    ) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
            description: description.into(),
            api_endpoint: api_endpoint.into(),
            is_active,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// SUBSCRIPTION
// ============================================================================

/// A user's quota entitlement for the current billing period.
///
/// Exactly one row per user (unique constraint). Re-subscribing overwrites
/// the row in place and resets `tokens_used`; it never creates a second row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Subscription {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: EntityId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub user_id: EntityId,
    pub plan: SubscriptionPlan,
    pub status: SubscriptionStatus,
    pub token_limit: i64,
    pub tokens_used: i64,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub period_start: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub expires_at: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

impl Subscription {
    /// Create a fresh subscription for `user_id` on `plan`.
    pub fn new(user_id: EntityId, plan: SubscriptionPlan, now: Timestamp) -> Self {
        Self {
            id: new_entity_id(),
            user_id,
            plan,
            status: SubscriptionStatus::Active,
            token_limit: plan.token_limit(),
            tokens_used: 0,
            period_start: now,
            expires_at: Self::expiry_for(plan, now),
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite this subscription for a re-subscribe to `plan`.
    ///
    /// Resets the consumed counter and restarts the period; keeps the row id
    /// so usage history joins stay stable.
    pub fn renew(&mut self, plan: SubscriptionPlan, now: Timestamp) {
        self.plan = plan;
        self.status = SubscriptionStatus::Active;
        self.token_limit = plan.token_limit();
        self.tokens_used = 0;
        self.period_start = now;
        self.expires_at = Self::expiry_for(plan, now);
        self.updated_at = now;
    }

    /// Expiry timestamp for a plan starting at `now`. Free never expires.
    fn expiry_for(plan: SubscriptionPlan, now: Timestamp) -> Option<Timestamp> {
        match plan {
            SubscriptionPlan::Free => None,
            _ => Some(now + Duration::days(PAID_PLAN_VALIDITY_DAYS)),
        }
    }

    /// Whether this subscription entitles the user to invoke tools at `now`.
    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        self.status == SubscriptionStatus::Active
            && self.expires_at.map_or(true, |expires| expires > now)
    }

    /// Whether the user still has quota left this period.
    pub fn has_quota(&self) -> bool {
        self.tokens_used < self.token_limit
    }
}

// ============================================================================
// USAGE LOG
// ============================================================================

/// Append-only record of one invocation attempt. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UsageLog {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: EntityId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub user_id: EntityId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub tool_id: EntityId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub timestamp: Timestamp,
    pub tokens_used: i64,
    /// Correlation id generated fresh per attempt, independent of any
    /// client-supplied id.
    pub request_id: Uuid,
    pub response_status: UsageResponseStatus,
    pub duration_ms: Option<i64>,
}

/// Insert payload for a usage log row; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUsageLog {
    pub user_id: EntityId,
    pub tool_id: EntityId,
    pub tokens_used: i64,
    pub request_id: Uuid,
    pub response_status: UsageResponseStatus,
    pub duration_ms: Option<i64>,
}

// ============================================================================
// API KEY
// ============================================================================

/// A long-lived credential for programmatic access.
///
/// Only the SHA-256 hash is stored; `key_prefix` keeps the first characters
/// of the plaintext so users can tell keys apart in listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: EntityId,
    pub user_id: EntityId,
    pub key_hash: String,
    pub key_prefix: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub last_used_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
}

impl ApiKey {
    pub fn new(
        user_id: EntityId,
        key_hash: impl Into<String>,
        key_prefix: impl Into<String>,
        name: impl Into<String>,
        expires_at: Option<Timestamp>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: new_entity_id(),
            user_id,
            key_hash: key_hash.into(),
            key_prefix: key_prefix.into(),
            name: name.into(),
            is_active: true,
            created_at: now,
            last_used_at: None,
            expires_at,
        }
    }

    /// Whether the key can authenticate requests at `now`.
    pub fn is_usable_at(&self, now: Timestamp) -> bool {
        self.is_active && self.expires_at.map_or(true, |expires| expires > now)
    }
}

// ============================================================================
// REFRESH TOKEN
// ============================================================================

/// One link in a refresh-token rotation chain.
///
/// Refreshing revokes the presented token and records its successor in
/// `replaced_by`. A revoked or expired token never authenticates again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: EntityId,
    pub user_id: EntityId,
    pub token_hash: String,
    pub expires_at: Timestamp,
    pub revoked: bool,
    pub created_at: Timestamp,
    pub replaced_by: Option<EntityId>,
}

impl RefreshToken {
    pub fn new(
        user_id: EntityId,
        token_hash: impl Into<String>,
        expires_at: Timestamp,
        now: Timestamp,
    ) -> Self {
        Self {
            id: new_entity_id(),
            user_id,
            token_hash: token_hash.into(),
            expires_at,
            revoked: false,
            created_at: now,
            replaced_by: None,
        }
    }

    /// Whether this token can still be exchanged at `now`.
    pub fn is_usable_at(&self, now: Timestamp) -> bool {
        !self.revoked && self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_subscription_renew_resets_counter() {
        let now = Utc::now();
        let mut sub = Subscription::new(new_entity_id(), SubscriptionPlan::Free, now);
        sub.tokens_used = 900;

        sub.renew(SubscriptionPlan::Pro, now);

        assert_eq!(sub.tokens_used, 0);
        assert_eq!(sub.token_limit, 50_000);
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(sub.expires_at.is_some());
    }

    #[test]
    fn test_free_plan_never_expires() {
        let now = Utc::now();
        let sub = Subscription::new(new_entity_id(), SubscriptionPlan::Free, now);
        assert_eq!(sub.expires_at, None);
        assert!(sub.is_valid_at(now + Duration::days(3650)));
    }

    #[test]
    fn test_expired_subscription_is_invalid() {
        let now = Utc::now();
        let sub = Subscription::new(new_entity_id(), SubscriptionPlan::Pro, now);
        let past_expiry = now + Duration::days(PAID_PLAN_VALIDITY_DAYS + 1);
        assert!(sub.is_valid_at(now));
        assert!(!sub.is_valid_at(past_expiry));
    }

    #[test]
    fn test_quota_boundary() {
        let now = Utc::now();
        let mut sub = Subscription::new(new_entity_id(), SubscriptionPlan::Free, now);
        sub.tokens_used = sub.token_limit - 1;
        assert!(sub.has_quota());
        sub.tokens_used = sub.token_limit;
        assert!(!sub.has_quota());
    }

    #[test]
    fn test_refresh_token_usability() {
        let now = Utc::now();
        let mut token = RefreshToken::new(new_entity_id(), "hash", now + Duration::days(7), now);
        assert!(token.is_usable_at(now));
        token.revoked = true;
        assert!(!token.is_usable_at(now));
    }
}
