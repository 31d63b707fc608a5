//! OpenAPI Document
//!
//! Aggregates every annotated route and schema into one `ApiDoc`, served at
//! /openapi.json. Security schemes cover both authentication methods.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// OpenAPI documentation for the Tollgate API.
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        crate::routes::health::ping,
        crate::routes::health::live,
        crate::routes::health::ready,
        // Auth
        crate::routes::auth::register,
        crate::routes::auth::login,
        crate::routes::auth::refresh,
        crate::routes::auth::logout,
        // Users
        crate::routes::user::get_profile,
        crate::routes::user::update_profile,
        crate::routes::user::list_api_keys,
        crate::routes::user::create_api_key,
        crate::routes::user::delete_api_key,
        // Tools
        crate::routes::tool::list_tools,
        crate::routes::tool::get_tool,
        crate::routes::tool::invoke_tool,
        // Subscriptions
        crate::routes::subscription::list_plans,
        crate::routes::subscription::get_current,
        crate::routes::subscription::subscribe,
        crate::routes::subscription::cancel,
        // Usage
        crate::routes::usage::get_history,
        crate::routes::usage::get_summary,
        // Admin
        crate::routes::admin::list_users,
        crate::routes::admin::create_tool,
        crate::routes::admin::update_tool,
        crate::routes::admin::delete_tool,
        crate::routes::admin::platform_stats,
    ),
    components(schemas(
        crate::error::ApiError,
        crate::error::ErrorCode,
        crate::types::RegisterRequest,
        crate::types::LoginRequest,
        crate::types::TokenPair,
        crate::types::RefreshRequest,
        crate::types::LogoutRequest,
        crate::types::UserProfile,
        crate::types::UpdateProfileRequest,
        crate::types::ApiKeyInfo,
        crate::types::CreateApiKeyRequest,
        crate::types::ApiKeyCreated,
        crate::types::ToolSummary,
        crate::types::ToolDetail,
        crate::types::ToolInvocationRequest,
        crate::types::SubscriptionPlanInfo,
        crate::types::SubscriptionDetail,
        crate::types::SubscribeRequest,
        crate::types::UsageLogEntry,
        crate::types::ToolUsageBreakdown,
        crate::types::DailyUsageBreakdown,
        crate::types::UsageSummary,
        crate::types::CreateToolRequest,
        crate::types::UpdateToolRequest,
        crate::types::PlatformToolStats,
        crate::types::PlatformDailyStats,
        crate::types::PlatformUsageStats,
        crate::routes::health::HealthResponse,
        crate::routes::health::HealthStatus,
        crate::routes::health::HealthDetails,
        crate::routes::health::ComponentHealth,
        tollgate_core::SubscriptionPlan,
        tollgate_core::SubscriptionStatus,
        tollgate_core::UsageResponseStatus,
        tollgate_core::UserRole,
        tollgate_invoke::InvocationOutcome,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Auth", description = "Registration, login and token rotation"),
        (name = "Users", description = "Profile and API key management"),
        (name = "Tools", description = "Tool catalog and invocation"),
        (name = "Subscriptions", description = "Plans and quota entitlements"),
        (name = "Usage", description = "Metered usage history and summaries"),
        (name = "Admin", description = "Platform administration"),
    ),
    info(
        title = "Tollgate API",
        description = "Multi-tenant tool-metering backend",
    )
)]
pub struct ApiDoc;

/// Registers the `api_key` and `bearer_auth` security schemes.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-api-key"))),
            );
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_builds() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_string(&doc).unwrap();

        assert!(json.contains("/api/v1/tools/{id}/invoke"));
        assert!(json.contains("/api/v1/auth/refresh"));
        assert!(json.contains("bearer_auth"));
    }
}
