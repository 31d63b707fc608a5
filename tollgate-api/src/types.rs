//! Request/response types for the REST API.
//!
//! Entities never cross the API boundary directly: responses are projections
//! that drop internal fields (password and credential hashes), and requests
//! are separate types so validation stays at the edge.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tollgate_core::{
    ApiKey, EntityId, Subscription, SubscriptionPlan, SubscriptionStatus, Timestamp, Tool,
    UsageLog, UsageResponseStatus, User, UserRole,
};
use uuid::Uuid;

// ============================================================================
// AUTH
// ============================================================================

/// POST /api/v1/auth/register request body.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// POST /api/v1/auth/login request body.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Access + refresh token pair returned by login and refresh.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// POST /api/v1/auth/refresh request body.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// POST /api/v1/auth/logout request body.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

// ============================================================================
// USERS
// ============================================================================

/// Public projection of a user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UserProfile {
    #[schema(value_type = String, format = "uuid")]
    pub id: EntityId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub is_active: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: Timestamp,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

/// PUT /api/v1/users/me request body. Absent fields stay unchanged.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub password: Option<String>,
}

/// Public projection of an API key (never includes the hash).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ApiKeyInfo {
    #[schema(value_type = String, format = "uuid")]
    pub id: EntityId,
    pub name: String,
    pub key_prefix: String,
    pub is_active: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: Timestamp,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub last_used_at: Option<Timestamp>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub expires_at: Option<Timestamp>,
}

impl From<ApiKey> for ApiKeyInfo {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id,
            name: key.name,
            key_prefix: key.key_prefix,
            is_active: key.is_active,
            created_at: key.created_at,
            last_used_at: key.last_used_at,
            expires_at: key.expires_at,
        }
    }
}

/// POST /api/v1/users/me/api-keys request body.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct CreateApiKeyRequest {
    pub name: String,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub expires_at: Option<Timestamp>,
}

/// Response for API key creation.
///
/// `key` is the plaintext credential and is returned exactly once; only its
/// hash is stored.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ApiKeyCreated {
    pub key: String,
    pub info: ApiKeyInfo,
}

// ============================================================================
// TOOLS
// ============================================================================

/// Catalog listing entry for a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ToolSummary {
    #[schema(value_type = String, format = "uuid")]
    pub id: EntityId,
    pub name: String,
    pub description: String,
    pub is_active: bool,
}

impl From<Tool> for ToolSummary {
    fn from(tool: Tool) -> Self {
        Self {
            id: tool.id,
            name: tool.name,
            description: tool.description,
            is_active: tool.is_active,
        }
    }
}

/// Full tool details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ToolDetail {
    #[schema(value_type = String, format = "uuid")]
    pub id: EntityId,
    pub name: String,
    pub description: String,
    pub api_endpoint: String,
    pub is_active: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: Timestamp,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: Timestamp,
}

impl From<Tool> for ToolDetail {
    fn from(tool: Tool) -> Self {
        Self {
            id: tool.id,
            name: tool.name,
            description: tool.description,
            api_endpoint: tool.api_endpoint,
            is_active: tool.is_active,
            created_at: tool.created_at,
            updated_at: tool.updated_at,
        }
    }
}

/// POST /api/v1/tools/{id}/invoke request body.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct ToolInvocationRequest {
    /// Arbitrary JSON object forwarded to the tool endpoint.
    #[schema(value_type = Object)]
    pub input: JsonValue,
}

// ============================================================================
// SUBSCRIPTIONS
// ============================================================================

/// One entry of GET /api/v1/subscriptions/plans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SubscriptionPlanInfo {
    pub plan: SubscriptionPlan,
    pub token_limit: i64,
    pub price_monthly: f64,
}

impl SubscriptionPlanInfo {
    pub fn for_plan(plan: SubscriptionPlan) -> Self {
        Self {
            plan,
            token_limit: plan.token_limit(),
            price_monthly: plan.price_monthly(),
        }
    }
}

/// Public projection of a subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SubscriptionDetail {
    #[schema(value_type = String, format = "uuid")]
    pub id: EntityId,
    pub plan: SubscriptionPlan,
    pub status: SubscriptionStatus,
    pub token_limit: i64,
    pub tokens_used: i64,
    #[schema(value_type = String, format = "date-time")]
    pub period_start: Timestamp,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub expires_at: Option<Timestamp>,
}

impl From<Subscription> for SubscriptionDetail {
    fn from(subscription: Subscription) -> Self {
        Self {
            id: subscription.id,
            plan: subscription.plan,
            status: subscription.status,
            token_limit: subscription.token_limit,
            tokens_used: subscription.tokens_used,
            period_start: subscription.period_start,
            expires_at: subscription.expires_at,
        }
    }
}

/// POST /api/v1/subscriptions/subscribe request body.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct SubscribeRequest {
    pub plan: SubscriptionPlan,
}

// ============================================================================
// USAGE
// ============================================================================

/// One row of GET /api/v1/usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UsageLogEntry {
    #[schema(value_type = String, format = "uuid")]
    pub id: EntityId,
    #[schema(value_type = String, format = "uuid")]
    pub tool_id: EntityId,
    #[schema(value_type = String, format = "date-time")]
    pub timestamp: Timestamp,
    pub tokens_used: i64,
    pub request_id: Uuid,
    pub response_status: UsageResponseStatus,
    pub duration_ms: Option<i64>,
}

impl From<UsageLog> for UsageLogEntry {
    fn from(log: UsageLog) -> Self {
        Self {
            id: log.id,
            tool_id: log.tool_id,
            timestamp: log.timestamp,
            tokens_used: log.tokens_used,
            request_id: log.request_id,
            response_status: log.response_status,
            duration_ms: log.duration_ms,
        }
    }
}

/// Query parameters shared by the usage endpoints.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct UsageQuery {
    #[param(value_type = Option<String>, format = "date-time")]
    pub start_date: Option<Timestamp>,
    #[param(value_type = Option<String>, format = "date-time")]
    pub end_date: Option<Timestamp>,
    #[serde(default)]
    pub skip: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Per-tool aggregation within a usage summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ToolUsageBreakdown {
    #[schema(value_type = String, format = "uuid")]
    pub tool_id: EntityId,
    pub tokens_used: i64,
    pub request_count: i64,
    pub avg_duration_ms: Option<f64>,
}

/// Per-day aggregation within a usage summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DailyUsageBreakdown {
    pub date: NaiveDate,
    pub tokens_used: i64,
    pub request_count: i64,
    pub avg_duration_ms: Option<f64>,
}

/// Response of GET /api/v1/usage/summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UsageSummary {
    pub total_tokens_used: i64,
    pub total_requests: i64,
    pub avg_duration_ms: Option<f64>,
    pub breakdown_by_tool: Vec<ToolUsageBreakdown>,
    pub breakdown_by_day: Vec<DailyUsageBreakdown>,
}

// ============================================================================
// ADMIN
// ============================================================================

/// Pagination query parameters.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct Pagination {
    #[serde(default)]
    pub skip: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl Pagination {
    /// Clamp to sane bounds: skip >= 0, 1 <= limit <= 100 (default 20).
    pub fn clamped(&self) -> (i64, i64) {
        let skip = self.skip.unwrap_or(0).max(0);
        let limit = self.limit.unwrap_or(20).clamp(1, 100);
        (skip, limit)
    }
}

/// POST /api/v1/admin/tools request body.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct CreateToolRequest {
    pub name: String,
    pub description: String,
    pub api_endpoint: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// PUT /api/v1/admin/tools/{id} request body. Absent fields stay unchanged.
#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdateToolRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub api_endpoint: Option<String>,
    pub is_active: Option<bool>,
}

/// Per-tool platform statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PlatformToolStats {
    #[schema(value_type = String, format = "uuid")]
    pub tool_id: EntityId,
    pub tool_name: String,
    pub usage_count: i64,
    pub total_tokens: i64,
}

/// Per-day platform statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PlatformDailyStats {
    pub date: NaiveDate,
    pub usage_count: i64,
    pub total_tokens: i64,
}

/// Response of GET /api/v1/admin/usage/stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PlatformUsageStats {
    pub total_users: i64,
    pub active_subscriptions: i64,
    pub total_tools: i64,
    pub total_usage_logs: i64,
    pub usage_by_tool: Vec<PlatformToolStats>,
    pub usage_by_day: Vec<PlatformDailyStats>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tollgate_core::new_entity_id;

    #[test]
    fn test_profile_drops_password_hash() {
        let user = User::new("Ada", "ada@example.com", "$2b$12$hash", Utc::now());
        let profile = UserProfile::from(user.clone());
        let json = serde_json::to_string(&profile).unwrap();

        assert!(json.contains("ada@example.com"));
        assert!(!json.contains("$2b$12$hash"));
        assert_eq!(profile.id, user.id);
    }

    #[test]
    fn test_pagination_clamping() {
        let defaults = Pagination::default();
        assert_eq!(defaults.clamped(), (0, 20));

        let wild = Pagination {
            skip: Some(-5),
            limit: Some(10_000),
        };
        assert_eq!(wild.clamped(), (0, 100));
    }

    #[test]
    fn test_plan_info_matches_plan() {
        let info = SubscriptionPlanInfo::for_plan(SubscriptionPlan::Pro);
        assert_eq!(info.token_limit, 50_000);
        assert!((info.price_monthly - 29.99).abs() < f64::EPSILON);
    }

    #[test]
    fn test_subscription_detail_projection() {
        let sub = Subscription::new(new_entity_id(), SubscriptionPlan::Enterprise, Utc::now());
        let detail = SubscriptionDetail::from(sub.clone());
        assert_eq!(detail.token_limit, 500_000);
        assert_eq!(detail.tokens_used, 0);
        assert_eq!(detail.id, sub.id);
    }
}
