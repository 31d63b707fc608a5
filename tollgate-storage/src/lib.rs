//! Tollgate Storage - Collaborator Traits and In-Memory Implementation
//!
//! Defines the narrow storage interfaces the invocation pipeline consumes.
//! The production PostgreSQL implementation lives in tollgate-api; the
//! in-memory implementation here backs tests and local development.

pub mod memory;

pub use memory::InMemoryStore;

use ::async_trait::async_trait;
use tollgate_core::{EntityId, NewUsageLog, StorageError, Subscription, Tool, UsageLog};

// ============================================================================
// TOOL CATALOG
// ============================================================================

/// Read access to the tool catalog.
///
/// The pipeline only ever resolves *active* tools; catalog administration
/// (create/update/deactivate) is an API-layer concern and deliberately not
/// part of this trait.
#[async_trait]
pub trait ToolCatalog: Send + Sync {
    /// Get a tool by id if it exists and is active.
    async fn get_active_tool(&self, tool_id: EntityId) -> Result<Option<Tool>, StorageError>;
}

// ============================================================================
// SUBSCRIPTION STORE
// ============================================================================

/// Access to subscription rows and the consumed-quota counter.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Get the subscription for a user, if any. At most one row exists.
    async fn get_subscription(
        &self,
        user_id: EntityId,
    ) -> Result<Option<Subscription>, StorageError>;

    /// Atomically add `amount` to the user's `tokens_used` counter.
    ///
    /// Implementations MUST NOT read-modify-write in application code:
    /// concurrent invocations by the same user would lose updates and let
    /// the user exceed quota. SQL backends use `tokens_used = tokens_used +
    /// $n`; the in-memory backend serializes under its write lock.
    ///
    /// Incrementing a user with no subscription row is a no-op, matching the
    /// implicit free tier applied by the quota check.
    async fn increment_tokens_used(
        &self,
        user_id: EntityId,
        amount: i64,
    ) -> Result<(), StorageError>;
}

// ============================================================================
// USAGE STORE
// ============================================================================

/// Append-only store of invocation attempts.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Append one usage log row. The store assigns id and timestamp.
    ///
    /// Rows are immutable once written; there is no update operation.
    async fn append_usage_log(&self, entry: NewUsageLog) -> Result<UsageLog, StorageError>;
}
