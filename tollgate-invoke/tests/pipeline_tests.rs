//! Integration tests for the invocation pipeline.
//!
//! Run against the in-memory store and scripted invokers: no network, no
//! database. Cover the guard ordering, the metering asymmetry (guard
//! rejections unmetered, external-stage attempts always logged), breaker
//! behavior through the pipeline, and the no-lost-update quota property.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use tollgate_core::{
    new_entity_id, CallerIdentity, CircuitState, EntityId, InvokeError, NewUsageLog, StorageError,
    Subscription, SubscriptionPlan, SubscriptionStatus, Tool, UsageLog, UsageResponseStatus,
};
use tollgate_invoke::breaker::CircuitBreakerConfig;
use tollgate_invoke::invoker::ToolInvoker;
use tollgate_invoke::pipeline::InvocationPipeline;
use tollgate_storage::{InMemoryStore, UsageStore};

// ============================================================================
// SCRIPTED INVOKER
// ============================================================================

enum InvokeBehavior {
    Succeed(JsonValue),
    Fail(InvokeError),
}

/// Invoker with a fixed scripted outcome and a call counter.
struct ScriptedInvoker {
    behavior: InvokeBehavior,
    calls: AtomicUsize,
}

impl ScriptedInvoker {
    fn succeed(payload: JsonValue) -> Arc<Self> {
        Arc::new(Self {
            behavior: InvokeBehavior::Succeed(payload),
            calls: AtomicUsize::new(0),
        })
    }

    fn fail(error: InvokeError) -> Arc<Self> {
        Arc::new(Self {
            behavior: InvokeBehavior::Fail(error),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolInvoker for ScriptedInvoker {
    async fn invoke(&self, _tool: &Tool, _input: &JsonValue) -> Result<JsonValue, InvokeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            InvokeBehavior::Succeed(payload) => Ok(payload.clone()),
            InvokeBehavior::Fail(error) => Err(error.clone()),
        }
    }
}

/// Usage store that rejects every append.
struct FailingUsageStore;

#[async_trait]
impl UsageStore for FailingUsageStore {
    async fn append_usage_log(&self, _entry: NewUsageLog) -> Result<UsageLog, StorageError> {
        Err(StorageError::Backend {
            reason: "disk full".to_string(),
        })
    }
}

// ============================================================================
// HARNESS
// ============================================================================

struct Harness {
    store: Arc<InMemoryStore>,
    invoker: Arc<ScriptedInvoker>,
    pipeline: Arc<InvocationPipeline>,
    caller: CallerIdentity,
    tool_id: EntityId,
}

impl Harness {
    fn new(invoker: Arc<ScriptedInvoker>, breaker: CircuitBreakerConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let now = Utc::now();

        let tool = Tool::new("echo", "Echo service", "http://127.0.0.1:9/echo", true, now);
        let tool_id = tool.id;
        store.put_tool(tool).unwrap();

        let user_id = new_entity_id();
        store
            .put_subscription(Subscription::new(user_id, SubscriptionPlan::Free, now))
            .unwrap();

        let pipeline = Arc::new(InvocationPipeline::new(
            store.clone(),
            store.clone(),
            store.clone(),
            invoker.clone(),
            breaker,
        ));

        Self {
            store,
            invoker,
            pipeline,
            caller: CallerIdentity::new(user_id),
            tool_id,
        }
    }

    fn with_behavior(invoker: Arc<ScriptedInvoker>) -> Self {
        Self::new(invoker, CircuitBreakerConfig::default())
    }

    async fn invoke(&self) -> tollgate_invoke::InvocationOutcome {
        self.pipeline
            .invoke_tool(self.caller, self.tool_id, json!({"q": "hello"}))
            .await
    }

    fn usage_logs(&self) -> Vec<UsageLog> {
        self.store.usage_logs_for_user(self.caller.id).unwrap()
    }

    fn tokens_used(&self) -> i64 {
        self.store
            .subscription_tokens_used(self.caller.id)
            .unwrap()
            .unwrap_or(0)
    }
}

/// 50-byte JSON payload: the canonical metering scenario.
fn fifty_byte_payload() -> JsonValue {
    let payload = json!({ "message": "a".repeat(36) });
    assert_eq!(payload.to_string().len(), 50);
    payload
}

// ============================================================================
// SUCCESS PATH
// ============================================================================

#[tokio::test]
async fn test_success_meters_and_records() {
    let harness = Harness::with_behavior(ScriptedInvoker::succeed(fifty_byte_payload()));

    let outcome = harness.invoke().await;

    assert!(outcome.success);
    assert_eq!(outcome.result, Some(fifty_byte_payload()));
    assert_eq!(outcome.error, None);
    assert!(outcome.duration_ms.is_some());

    let logs = harness.usage_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].tokens_used, 50);
    assert_eq!(logs[0].response_status, UsageResponseStatus::Success);
    assert!(logs[0].duration_ms.is_some());

    assert_eq!(harness.tokens_used(), 50);
}

#[tokio::test]
async fn test_request_ids_are_fresh_per_attempt() {
    let harness = Harness::with_behavior(ScriptedInvoker::succeed(json!({"ok": true})));

    harness.invoke().await;
    harness.invoke().await;

    let logs = harness.usage_logs();
    assert_eq!(logs.len(), 2);
    assert_ne!(logs[0].request_id, logs[1].request_id);
}

// ============================================================================
// GUARD REJECTIONS (unmetered)
// ============================================================================

#[tokio::test]
async fn test_missing_subscription_rejected_at_step_one() {
    let invoker = ScriptedInvoker::succeed(json!({"ok": true}));
    let harness = Harness::with_behavior(Arc::clone(&invoker));

    // A user with no rows at all: the quota check would pass (implicit free
    // tier) but the validity check fails first. Verify the asymmetry.
    let stranger = CallerIdentity::new(new_entity_id());
    let outcome = harness
        .pipeline
        .invoke_tool(stranger, harness.tool_id, json!({}))
        .await;

    assert!(!outcome.success);
    assert_eq!(
        outcome.error.as_deref(),
        Some("User does not have an active subscription")
    );
    assert_eq!(outcome.duration_ms, None);
    assert_eq!(invoker.calls(), 0);
    assert_eq!(harness.store.usage_log_count().unwrap(), 0);
}

#[tokio::test]
async fn test_cancelled_subscription_rejected() {
    let invoker = ScriptedInvoker::succeed(json!({"ok": true}));
    let harness = Harness::with_behavior(Arc::clone(&invoker));

    let mut subscription = Subscription::new(harness.caller.id, SubscriptionPlan::Pro, Utc::now());
    subscription.status = SubscriptionStatus::Cancelled;
    harness.store.put_subscription(subscription).unwrap();

    let outcome = harness.invoke().await;

    assert!(!outcome.success);
    assert_eq!(
        outcome.error.as_deref(),
        Some("User does not have an active subscription")
    );
    assert_eq!(invoker.calls(), 0);
}

#[tokio::test]
async fn test_quota_exhausted_rejected_unmetered() {
    let invoker = ScriptedInvoker::succeed(json!({"ok": true}));
    let harness = Harness::with_behavior(Arc::clone(&invoker));

    let mut subscription = Subscription::new(harness.caller.id, SubscriptionPlan::Free, Utc::now());
    subscription.tokens_used = subscription.token_limit;
    harness.store.put_subscription(subscription).unwrap();

    let outcome = harness.invoke().await;

    assert!(!outcome.success);
    assert_eq!(
        outcome.error.as_deref(),
        Some("User has exceeded their token limit")
    );
    assert_eq!(invoker.calls(), 0);
    assert_eq!(harness.store.usage_log_count().unwrap(), 0);
}

#[tokio::test]
async fn test_inactive_tool_rejected_unmetered() {
    let invoker = ScriptedInvoker::succeed(json!({"ok": true}));
    let harness = Harness::with_behavior(Arc::clone(&invoker));

    let mut tool = Tool::new("dead", "Deactivated", "http://127.0.0.1:9/dead", true, Utc::now());
    tool.is_active = false;
    let tool_id = tool.id;
    harness.store.put_tool(tool).unwrap();

    let outcome = harness
        .pipeline
        .invoke_tool(harness.caller, tool_id, json!({}))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("Tool not found or inactive"));
    assert_eq!(invoker.calls(), 0);
    assert_eq!(harness.store.usage_log_count().unwrap(), 0);
}

// ============================================================================
// EXTERNAL-STAGE FAILURES (always metered)
// ============================================================================

#[tokio::test]
async fn test_upstream_error_records_zero_tokens() {
    let harness =
        Harness::with_behavior(ScriptedInvoker::fail(InvokeError::UpstreamStatus { status: 502 }));

    let outcome = harness.invoke().await;

    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("Tool returned status code: 502"));
    assert!(outcome.duration_ms.is_some());

    let logs = harness.usage_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].tokens_used, 0);
    assert_eq!(logs[0].response_status, UsageResponseStatus::Error);

    assert_eq!(harness.tokens_used(), 0);
    let breaker = harness.pipeline.breakers().get(harness.tool_id).unwrap();
    assert_eq!(breaker.failure_count(), 1);
}

#[tokio::test]
async fn test_timeout_records_timeout_status() {
    let harness = Harness::with_behavior(ScriptedInvoker::fail(InvokeError::Timeout));

    let outcome = harness.invoke().await;

    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("Tool invocation timed out"));

    let logs = harness.usage_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].response_status, UsageResponseStatus::Timeout);
    assert_eq!(logs[0].tokens_used, 0);

    let breaker = harness.pipeline.breakers().get(harness.tool_id).unwrap();
    assert_eq!(breaker.failure_count(), 1);
}

#[tokio::test]
async fn test_breaker_opens_and_rejections_are_logged() {
    let invoker = ScriptedInvoker::fail(InvokeError::UpstreamStatus { status: 500 });
    let harness = Harness::new(
        Arc::clone(&invoker),
        CircuitBreakerConfig {
            failure_threshold: 2,
            cooldown: std::time::Duration::from_secs(60),
        },
    );

    harness.invoke().await;
    harness.invoke().await;

    let breaker = harness.pipeline.breakers().get(harness.tool_id).unwrap();
    assert_eq!(breaker.state(), CircuitState::Open);

    // Third attempt: rejected without reaching the invoker, but still logged.
    let outcome = harness.invoke().await;
    assert!(!outcome.success);
    assert!(outcome
        .error
        .as_deref()
        .unwrap()
        .starts_with("Circuit breaker is open"));
    assert_eq!(invoker.calls(), 2);

    let logs = harness.usage_logs();
    assert_eq!(logs.len(), 3);
    assert!(logs
        .iter()
        .all(|log| log.response_status == UsageResponseStatus::Error && log.tokens_used == 0));
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_successes_do_not_lose_quota_updates() {
    let payload = json!({"ok": true});
    let cost = payload.to_string().len() as i64;
    let harness = Harness::with_behavior(ScriptedInvoker::succeed(payload));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let pipeline = Arc::clone(&harness.pipeline);
        let caller = harness.caller;
        let tool_id = harness.tool_id;
        handles.push(tokio::spawn(async move {
            pipeline.invoke_tool(caller, tool_id, json!({})).await
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap().success);
    }

    assert_eq!(harness.tokens_used(), 16 * cost);
    assert_eq!(harness.usage_logs().len(), 16);
}

// ============================================================================
// PERSISTENCE FAILURES
// ============================================================================

#[tokio::test]
async fn test_usage_persistence_failure_fails_the_invocation() {
    let store = Arc::new(InMemoryStore::new());
    let now = Utc::now();

    let tool = Tool::new("echo", "Echo service", "http://127.0.0.1:9/echo", true, now);
    let tool_id = tool.id;
    store.put_tool(tool).unwrap();

    let user_id = new_entity_id();
    store
        .put_subscription(Subscription::new(user_id, SubscriptionPlan::Free, now))
        .unwrap();

    let pipeline = InvocationPipeline::new(
        store.clone(),
        store.clone(),
        Arc::new(FailingUsageStore),
        ScriptedInvoker::succeed(json!({"ok": true})),
        CircuitBreakerConfig::default(),
    );

    let outcome = pipeline
        .invoke_tool(CallerIdentity::new(user_id), tool_id, json!({}))
        .await;

    assert!(!outcome.success);
    assert!(outcome
        .error
        .as_deref()
        .unwrap()
        .starts_with("Usage persistence failed"));

    // The quota counter must not move when the usage row was never written.
    assert_eq!(store.subscription_tokens_used(user_id).unwrap(), Some(0));
}
