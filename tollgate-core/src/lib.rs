//! Tollgate Core - Entity Types
//!
//! Pure data structures with no behavior. All other crates depend on this.
//! This crate contains ONLY data types - no business logic.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod entities;
pub mod enums;
pub mod error;

pub use entities::{
    ApiKey, CallerIdentity, NewUsageLog, RefreshToken, Subscription, Tool, UsageLog, User,
};
pub use enums::{
    CircuitState, CircuitStateParseError, SubscriptionPlan, SubscriptionPlanParseError,
    SubscriptionStatus, SubscriptionStatusParseError, UsageResponseStatus,
    UsageResponseStatusParseError, UserRole, UserRoleParseError,
};
pub use error::{
    ConfigError, EntityType, InvokeError, StorageError, TollgateError, TollgateResult,
    ValidationError,
};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
/// UUIDv7 embeds a Unix timestamp, making IDs naturally sortable by creation time.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

/// Generate a correlation id for one invocation attempt.
///
/// Request ids are random (UUIDv4) rather than timestamp-sortable: they exist
/// for log correlation, never for ordering, and must be independent of any
/// client-supplied identifier.
pub fn new_request_id() -> Uuid {
    Uuid::new_v4()
}

// ============================================================================
// QUOTA DEFAULTS
// ============================================================================

/// Token limit applied when a user has no subscription row at all.
///
/// Users without a subscription are treated as implicit free tier for the
/// quota check (limit 1000, used 0). Subscription *validity* is a separate
/// check and still fails for them. Product has flagged this default for
/// confirmation; preserve it as-is.
pub const IMPLICIT_FREE_TOKEN_LIMIT: i64 = 1_000;
