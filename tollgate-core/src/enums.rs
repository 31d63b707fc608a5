//! Enumerations shared across the Tollgate platform.
//!
//! Every enum that round-trips through the database carries `as_db_str` /
//! `from_db_str` conversions so the storage layer never depends on serde
//! representations.

use serde::{Deserialize, Serialize};

// ============================================================================
// SUBSCRIPTION PLAN
// ============================================================================

/// Subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    Free,
    Pro,
    Enterprise,
}

impl SubscriptionPlan {
    /// Token quota granted per billing period for this plan.
    pub fn token_limit(&self) -> i64 {
        match self {
            Self::Free => 1_000,
            Self::Pro => 50_000,
            Self::Enterprise => 500_000,
        }
    }

    /// Monthly price in USD.
    pub fn price_monthly(&self) -> f64 {
        match self {
            Self::Free => 0.0,
            Self::Pro => 29.99,
            Self::Enterprise => 299.99,
        }
    }

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, SubscriptionPlanParseError> {
        match s {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(SubscriptionPlanParseError(s.to_string())),
        }
    }
}

/// Error parsing SubscriptionPlan from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionPlanParseError(pub String);

impl std::fmt::Display for SubscriptionPlanParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid subscription plan: {}", self.0)
    }
}

impl std::error::Error for SubscriptionPlanParseError {}

// ============================================================================
// SUBSCRIPTION STATUS
// ============================================================================

/// Lifecycle status of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, SubscriptionStatusParseError> {
        match s {
            "active" => Ok(Self::Active),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            _ => Err(SubscriptionStatusParseError(s.to_string())),
        }
    }
}

/// Error parsing SubscriptionStatus from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionStatusParseError(pub String);

impl std::fmt::Display for SubscriptionStatusParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid subscription status: {}", self.0)
    }
}

impl std::error::Error for SubscriptionStatusParseError {}

// ============================================================================
// USAGE RESPONSE STATUS
// ============================================================================

/// Outcome recorded on a usage log row.
///
/// Circuit-open rejections are recorded as `Error`; timeouts keep their own
/// variant because they are billed and alerted on separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum UsageResponseStatus {
    Success,
    Error,
    Timeout,
}

impl UsageResponseStatus {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Timeout => "timeout",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, UsageResponseStatusParseError> {
        match s {
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            "timeout" => Ok(Self::Timeout),
            _ => Err(UsageResponseStatusParseError(s.to_string())),
        }
    }
}

/// Error parsing UsageResponseStatus from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageResponseStatusParseError(pub String);

impl std::fmt::Display for UsageResponseStatusParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid usage response status: {}", self.0)
    }
}

impl std::error::Error for UsageResponseStatusParseError {}

// ============================================================================
// USER ROLE
// ============================================================================

/// Authorization role attached to a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, UserRoleParseError> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(UserRoleParseError(s.to_string())),
        }
    }
}

/// Error parsing UserRole from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRoleParseError(pub String);

impl std::fmt::Display for UserRoleParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid user role: {}", self.0)
    }
}

impl std::error::Error for UserRoleParseError {}

// ============================================================================
// CIRCUIT STATE
// ============================================================================

/// Circuit breaker state.
///
/// Stored as a `u8` inside an atomic in the breaker; the `From<u8>` impl is
/// the inverse of `as u8` casts on these discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally
    Closed = 0,
    /// Circuit is open, requests are rejected
    Open = 1,
    /// Circuit allows a single trial request
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }
}

impl CircuitState {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, CircuitStateParseError> {
        match s {
            "closed" => Ok(Self::Closed),
            "open" => Ok(Self::Open),
            "half_open" => Ok(Self::HalfOpen),
            _ => Err(CircuitStateParseError(s.to_string())),
        }
    }
}

/// Error parsing CircuitState from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitStateParseError(pub String);

impl std::fmt::Display for CircuitStateParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid circuit state: {}", self.0)
    }
}

impl std::error::Error for CircuitStateParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_db_roundtrip() {
        for plan in [
            SubscriptionPlan::Free,
            SubscriptionPlan::Pro,
            SubscriptionPlan::Enterprise,
        ] {
            assert_eq!(SubscriptionPlan::from_db_str(plan.as_db_str()), Ok(plan));
        }
        assert!(SubscriptionPlan::from_db_str("platinum").is_err());
    }

    #[test]
    fn test_plan_limits_are_ordered() {
        assert!(SubscriptionPlan::Free.token_limit() < SubscriptionPlan::Pro.token_limit());
        assert!(SubscriptionPlan::Pro.token_limit() < SubscriptionPlan::Enterprise.token_limit());
    }

    #[test]
    fn test_circuit_state_u8_roundtrip() {
        for state in [
            CircuitState::Closed,
            CircuitState::Open,
            CircuitState::HalfOpen,
        ] {
            assert_eq!(CircuitState::from(state as u8), state);
        }
    }

    #[test]
    fn test_usage_status_db_strings() {
        assert_eq!(UsageResponseStatus::Success.as_db_str(), "success");
        assert_eq!(UsageResponseStatus::Error.as_db_str(), "error");
        assert_eq!(UsageResponseStatus::Timeout.as_db_str(), "timeout");
    }
}
