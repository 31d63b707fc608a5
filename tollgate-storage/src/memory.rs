//! In-memory storage backend.
//!
//! Backs unit/integration tests and local development. All maps live behind
//! a single `RwLock`; trait methods take the lock for the duration of the
//! operation, which serializes counter updates and gives the same
//! no-lost-update guarantee the SQL backend gets from atomic UPDATEs.

use std::collections::HashMap;
use std::sync::RwLock;

use ::async_trait::async_trait;
use chrono::Utc;
use tollgate_core::{
    new_entity_id, EntityId, NewUsageLog, StorageError, Subscription, Tool, UsageLog,
};

use crate::{SubscriptionStore, ToolCatalog, UsageStore};

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    tools: HashMap<EntityId, Tool>,
    /// Keyed by user id: at most one subscription per user.
    subscriptions: HashMap<EntityId, Subscription>,
    usage_logs: Vec<UsageLog>,
}

/// In-memory store implementing every collaborator trait.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // SEEDING / INSPECTION HELPERS
    // ========================================================================

    /// Insert or replace a tool.
    pub fn put_tool(&self, tool: Tool) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| StorageError::LockPoisoned)?;
        state.tools.insert(tool.id, tool);
        Ok(())
    }

    /// Insert or replace the subscription for `subscription.user_id`.
    pub fn put_subscription(&self, subscription: Subscription) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| StorageError::LockPoisoned)?;
        state
            .subscriptions
            .insert(subscription.user_id, subscription);
        Ok(())
    }

    /// Current `tokens_used` for a user's subscription, if a row exists.
    pub fn subscription_tokens_used(
        &self,
        user_id: EntityId,
    ) -> Result<Option<i64>, StorageError> {
        let state = self.state.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(state
            .subscriptions
            .get(&user_id)
            .map(|subscription| subscription.tokens_used))
    }

    /// Snapshot of all usage rows for a user, oldest first.
    pub fn usage_logs_for_user(&self, user_id: EntityId) -> Result<Vec<UsageLog>, StorageError> {
        let state = self.state.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(state
            .usage_logs
            .iter()
            .filter(|log| log.user_id == user_id)
            .cloned()
            .collect())
    }

    /// Total number of usage rows across all users.
    pub fn usage_log_count(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(state.usage_logs.len())
    }
}

// ============================================================================
// TRAIT IMPLEMENTATIONS
// ============================================================================

#[async_trait]
impl ToolCatalog for InMemoryStore {
    async fn get_active_tool(&self, tool_id: EntityId) -> Result<Option<Tool>, StorageError> {
        let state = self.state.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(state
            .tools
            .get(&tool_id)
            .filter(|tool| tool.is_active)
            .cloned())
    }
}

#[async_trait]
impl SubscriptionStore for InMemoryStore {
    async fn get_subscription(
        &self,
        user_id: EntityId,
    ) -> Result<Option<Subscription>, StorageError> {
        let state = self.state.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(state.subscriptions.get(&user_id).cloned())
    }

    async fn increment_tokens_used(
        &self,
        user_id: EntityId,
        amount: i64,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| StorageError::LockPoisoned)?;
        if let Some(subscription) = state.subscriptions.get_mut(&user_id) {
            subscription.tokens_used += amount;
            subscription.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl UsageStore for InMemoryStore {
    async fn append_usage_log(&self, entry: NewUsageLog) -> Result<UsageLog, StorageError> {
        let mut state = self.state.write().map_err(|_| StorageError::LockPoisoned)?;
        let log = UsageLog {
            id: new_entity_id(),
            user_id: entry.user_id,
            tool_id: entry.tool_id,
            timestamp: Utc::now(),
            tokens_used: entry.tokens_used,
            request_id: entry.request_id,
            response_status: entry.response_status,
            duration_ms: entry.duration_ms,
        };
        state.usage_logs.push(log.clone());
        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tollgate_core::{new_request_id, SubscriptionPlan, UsageResponseStatus};

    fn seeded_subscription(user_id: EntityId) -> Subscription {
        Subscription::new(user_id, SubscriptionPlan::Pro, Utc::now())
    }

    #[tokio::test]
    async fn test_inactive_tools_are_invisible() {
        let store = InMemoryStore::new();
        let mut tool = Tool::new("echo", "Echo service", "http://localhost:9/echo", true, Utc::now());
        tool.is_active = false;
        let id = tool.id;
        store.put_tool(tool).unwrap();

        assert_eq!(store.get_active_tool(id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_increment_without_row_is_noop() {
        let store = InMemoryStore::new();
        let user_id = new_entity_id();
        store.increment_tokens_used(user_id, 42).await.unwrap();
        assert_eq!(store.get_subscription(user_id).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_increments_do_not_lose_updates() {
        let store = Arc::new(InMemoryStore::new());
        let user_id = new_entity_id();
        store.put_subscription(seeded_subscription(user_id)).unwrap();

        let mut handles = Vec::new();
        for _ in 0..64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.increment_tokens_used(user_id, 7).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let sub = store.get_subscription(user_id).await.unwrap().unwrap();
        assert_eq!(sub.tokens_used, 64 * 7);
    }

    #[tokio::test]
    async fn test_usage_append_assigns_id_and_timestamp() {
        let store = InMemoryStore::new();
        let user_id = new_entity_id();
        let log = store
            .append_usage_log(NewUsageLog {
                user_id,
                tool_id: new_entity_id(),
                tokens_used: 50,
                request_id: new_request_id(),
                response_status: UsageResponseStatus::Success,
                duration_ms: Some(12),
            })
            .await
            .unwrap();

        assert_eq!(log.tokens_used, 50);
        assert_eq!(store.usage_logs_for_user(user_id).unwrap(), vec![log]);
    }
}
