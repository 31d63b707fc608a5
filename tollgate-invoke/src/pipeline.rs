//! Invocation orchestrator.
//!
//! Sequences the invocation path: subscription guard, quota guard, active
//! tool lookup, breaker-gated external call, usage recording, quota
//! increment. Every exit is normalized into `InvocationOutcome`; no storage
//! or transport error type crosses this boundary.
//!
//! Metering asymmetry (billing-relevant, preserve exactly): the three guard
//! steps are cheap rejections and are never logged; every attempt that
//! reaches the external-call stage produces exactly one usage row, whatever
//! its outcome.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tollgate_core::{
    new_request_id, CallerIdentity, EntityId, InvokeError, NewUsageLog, Tool, UsageResponseStatus,
    IMPLICIT_FREE_TOKEN_LIMIT,
};
use tollgate_storage::{SubscriptionStore, ToolCatalog, UsageStore};

use crate::breaker::{BreakerRegistry, CircuitBreakerConfig};
use crate::cost::response_token_cost;
use crate::invoker::ToolInvoker;

// ============================================================================
// OUTCOME
// ============================================================================

/// Uniform result of one invocation attempt.
///
/// All fields are always serialized (null rather than omitted) so API
/// clients can rely on the shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct InvocationOutcome {
    pub success: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub result: Option<JsonValue>,
    pub error: Option<String>,
    pub duration_ms: Option<i64>,
}

impl InvocationOutcome {
    fn success(result: JsonValue, duration_ms: i64) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            duration_ms: Some(duration_ms),
        }
    }

    fn failure(error: &InvokeError, duration_ms: Option<i64>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.to_string()),
            duration_ms,
        }
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// The tool-invocation pipeline.
///
/// Holds its collaborators as trait objects and owns the breaker registry,
/// so one pipeline instance is the single authority for breaker state in the
/// process.
pub struct InvocationPipeline {
    catalog: Arc<dyn ToolCatalog>,
    subscriptions: Arc<dyn SubscriptionStore>,
    usage: Arc<dyn UsageStore>,
    invoker: Arc<dyn ToolInvoker>,
    breakers: BreakerRegistry,
}

impl InvocationPipeline {
    pub fn new(
        catalog: Arc<dyn ToolCatalog>,
        subscriptions: Arc<dyn SubscriptionStore>,
        usage: Arc<dyn UsageStore>,
        invoker: Arc<dyn ToolInvoker>,
        breaker_config: CircuitBreakerConfig,
    ) -> Self {
        Self {
            catalog,
            subscriptions,
            usage,
            invoker,
            breakers: BreakerRegistry::new(breaker_config),
        }
    }

    /// Breaker registry, exposed for observability endpoints and tests.
    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    /// Invoke `tool_id` on behalf of `caller` with `input` as the request body.
    ///
    /// Steps, strictly ordered and short-circuiting:
    /// 1. subscription validity - unmetered rejection
    /// 2. quota - unmetered rejection
    /// 3. active tool lookup - unmetered rejection
    /// 4. breaker-gated external call
    /// 5. on success: meter, record usage, increment the quota counter
    /// 6. on failure: record usage with zero tokens
    pub async fn invoke_tool(
        &self,
        caller: CallerIdentity,
        tool_id: EntityId,
        input: JsonValue,
    ) -> InvocationOutcome {
        match self.guard_and_lookup(caller.id, tool_id).await {
            Ok(tool) => self.execute_metered(caller, tool, input).await,
            Err(err) => {
                tracing::debug!(
                    user_id = %caller.id,
                    %tool_id,
                    error = %err,
                    "invocation rejected before external call"
                );
                InvocationOutcome::failure(&err, None)
            }
        }
    }

    // ========================================================================
    // GUARDS (steps 1-3)
    // ========================================================================

    async fn guard_and_lookup(
        &self,
        user_id: EntityId,
        tool_id: EntityId,
    ) -> Result<Tool, InvokeError> {
        if !self.is_subscription_valid(user_id).await? {
            return Err(InvokeError::NoActiveSubscription);
        }
        if !self.has_quota(user_id).await? {
            return Err(InvokeError::QuotaExceeded);
        }
        self.catalog
            .get_active_tool(tool_id)
            .await?
            .ok_or(InvokeError::ToolUnavailable)
    }

    /// True iff the user has an active, unexpired subscription row.
    ///
    /// Read-only; absence of a row is "no valid subscription", not an error.
    async fn is_subscription_valid(&self, user_id: EntityId) -> Result<bool, InvokeError> {
        let now = Utc::now();
        let subscription = self.subscriptions.get_subscription(user_id).await?;
        Ok(subscription.map_or(false, |s| s.is_valid_at(now)))
    }

    /// True iff the user still has quota this period.
    ///
    /// A user with no subscription row gets the implicit free tier (limit
    /// 1000, used 0), so the check always passes for them. Deliberate policy,
    /// flagged for product confirmation - see `IMPLICIT_FREE_TOKEN_LIMIT`.
    async fn has_quota(&self, user_id: EntityId) -> Result<bool, InvokeError> {
        match self.subscriptions.get_subscription(user_id).await? {
            Some(subscription) => Ok(subscription.has_quota()),
            None => Ok(0 < IMPLICIT_FREE_TOKEN_LIMIT),
        }
    }

    // ========================================================================
    // METERED EXECUTION (steps 4-6)
    // ========================================================================

    async fn execute_metered(
        &self,
        caller: CallerIdentity,
        tool: Tool,
        input: JsonValue,
    ) -> InvocationOutcome {
        let breaker = self.breakers.breaker_for(tool.id);
        let started = Instant::now();
        let result = breaker
            .execute(tool.id, self.invoker.invoke(&tool, &input))
            .await;
        let duration_ms = started.elapsed().as_millis() as i64;

        match result {
            Ok(payload) => {
                let tokens_used = response_token_cost(&payload);

                if let Err(err) = self
                    .record_attempt(
                        caller.id,
                        tool.id,
                        tokens_used,
                        duration_ms,
                        UsageResponseStatus::Success,
                    )
                    .await
                {
                    return InvocationOutcome::failure(&err, Some(duration_ms));
                }
                if let Err(err) = self
                    .subscriptions
                    .increment_tokens_used(caller.id, tokens_used)
                    .await
                {
                    let err = InvokeError::from(err);
                    tracing::error!(
                        user_id = %caller.id,
                        tool_id = %tool.id,
                        error = %err,
                        "quota increment failed after successful invocation"
                    );
                    return InvocationOutcome::failure(&err, Some(duration_ms));
                }

                tracing::debug!(
                    user_id = %caller.id,
                    tool_id = %tool.id,
                    tokens_used,
                    duration_ms,
                    "tool invocation succeeded"
                );
                InvocationOutcome::success(payload, duration_ms)
            }
            Err(err) => {
                tracing::warn!(
                    user_id = %caller.id,
                    tool_id = %tool.id,
                    error = %err,
                    duration_ms,
                    "tool invocation failed"
                );
                // Failed attempts are still recorded, with zero tokens. If the
                // record itself cannot be written the attempt goes unrecorded;
                // that one gap requires out-of-band reconciliation.
                if let Err(persist_err) = self
                    .record_attempt(caller.id, tool.id, 0, duration_ms, err.response_status())
                    .await
                {
                    return InvocationOutcome::failure(&persist_err, Some(duration_ms));
                }
                InvocationOutcome::failure(&err, Some(duration_ms))
            }
        }
    }

    async fn record_attempt(
        &self,
        user_id: EntityId,
        tool_id: EntityId,
        tokens_used: i64,
        duration_ms: i64,
        response_status: UsageResponseStatus,
    ) -> Result<(), InvokeError> {
        self.usage
            .append_usage_log(NewUsageLog {
                user_id,
                tool_id,
                tokens_used,
                request_id: new_request_id(),
                response_status,
                duration_ms: Some(duration_ms),
            })
            .await
            .map(|_| ())
            .map_err(InvokeError::from)
    }
}

impl std::fmt::Debug for InvocationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationPipeline")
            .field("breakers", &self.breakers)
            .finish()
    }
}
