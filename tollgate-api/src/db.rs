//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling (deadpool-postgres) and a typed client
//! wrapper over plain SQL. The schema lives in `sql/schema.sql`.
//!
//! The quota counter update is the one statement with a correctness
//! constraint beyond CRUD: it must be a relative UPDATE
//! (`tokens_used = tokens_used + $n`), never a read-modify-write, so that
//! concurrent invocations by the same user cannot lose increments.

use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use std::time::Duration;
use tokio_postgres::{NoTls, Row};

use crate::auth::sha256_hex;
use crate::error::{ApiError, ApiResult};
use crate::types::{
    DailyUsageBreakdown, PlatformDailyStats, PlatformToolStats, ToolUsageBreakdown, UsageSummary,
};
use tollgate_core::{
    new_entity_id, ApiKey, EntityId, NewUsageLog, RefreshToken, StorageError, Subscription,
    SubscriptionPlan, SubscriptionStatus, Timestamp, Tool, UsageLog, UsageResponseStatus, User,
    UserRole,
};
use tollgate_storage::{SubscriptionStore, ToolCatalog, UsageStore};

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "tollgate".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `TOLLGATE_DB_HOST` (default: localhost)
    /// - `TOLLGATE_DB_PORT` (default: 5432)
    /// - `TOLLGATE_DB_NAME` (default: tollgate)
    /// - `TOLLGATE_DB_USER` (default: postgres)
    /// - `TOLLGATE_DB_PASSWORD` (default: empty)
    /// - `TOLLGATE_DB_POOL_SIZE` (default: 16)
    /// - `TOLLGATE_DB_TIMEOUT` (default: 30 seconds)
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("TOLLGATE_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("TOLLGATE_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("TOLLGATE_DB_NAME").unwrap_or_else(|_| "tollgate".to_string()),
            user: std::env::var("TOLLGATE_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("TOLLGATE_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("TOLLGATE_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("TOLLGATE_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

const USER_COLUMNS: &str = "id, name, email, password_hash, role, is_active, created_at, updated_at";
const TOOL_COLUMNS: &str = "id, name, description, api_endpoint, is_active, created_at, updated_at";
const SUBSCRIPTION_COLUMNS: &str =
    "id, user_id, plan, status, token_limit, tokens_used, period_start, expires_at, created_at, updated_at";
const USAGE_LOG_COLUMNS: &str =
    "id, user_id, tool_id, timestamp, tokens_used, request_id, response_status, duration_ms";
const API_KEY_COLUMNS: &str =
    "id, user_id, key_hash, key_prefix, name, is_active, created_at, last_used_at, expires_at";
const REFRESH_TOKEN_COLUMNS: &str =
    "id, user_id, token_hash, expires_at, revoked, created_at, replaced_by";

fn user_from_row(row: &Row) -> ApiResult<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: UserRole::from_db_str(&role).map_err(|e| ApiError::database_error(e.to_string()))?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn tool_from_row(row: &Row) -> ApiResult<Tool> {
    Ok(Tool {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        api_endpoint: row.try_get("api_endpoint")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn subscription_from_row(row: &Row) -> ApiResult<Subscription> {
    let plan: String = row.try_get("plan")?;
    let status: String = row.try_get("status")?;
    Ok(Subscription {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        plan: SubscriptionPlan::from_db_str(&plan)
            .map_err(|e| ApiError::database_error(e.to_string()))?,
        status: SubscriptionStatus::from_db_str(&status)
            .map_err(|e| ApiError::database_error(e.to_string()))?,
        token_limit: row.try_get("token_limit")?,
        tokens_used: row.try_get("tokens_used")?,
        period_start: row.try_get("period_start")?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn usage_log_from_row(row: &Row) -> ApiResult<UsageLog> {
    let response_status: String = row.try_get("response_status")?;
    Ok(UsageLog {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        tool_id: row.try_get("tool_id")?,
        timestamp: row.try_get("timestamp")?,
        tokens_used: row.try_get("tokens_used")?,
        request_id: row.try_get("request_id")?,
        response_status: UsageResponseStatus::from_db_str(&response_status)
            .map_err(|e| ApiError::database_error(e.to_string()))?,
        duration_ms: row.try_get("duration_ms")?,
    })
}

fn api_key_from_row(row: &Row) -> ApiResult<ApiKey> {
    Ok(ApiKey {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        key_hash: row.try_get("key_hash")?,
        key_prefix: row.try_get("key_prefix")?,
        name: row.try_get("name")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        last_used_at: row.try_get("last_used_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

fn refresh_token_from_row(row: &Row) -> ApiResult<RefreshToken> {
    Ok(RefreshToken {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        token_hash: row.try_get("token_hash")?,
        expires_at: row.try_get("expires_at")?,
        revoked: row.try_get("revoked")?,
        created_at: row.try_get("created_at")?,
        replaced_by: row.try_get("replaced_by")?,
    })
}

// ============================================================================
// DATABASE CLIENT WRAPPER
// ============================================================================

/// Database client wrapping the connection pool with typed operations.
#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
}

impl DbClient {
    /// Create a new database client with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new database client from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Get a connection from the pool.
    async fn get_conn(&self) -> ApiResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(ApiError::from)
    }

    /// Liveness probe: round-trip one trivial query.
    pub async fn ping(&self) -> ApiResult<()> {
        let conn = self.get_conn().await?;
        conn.query_one("SELECT 1", &[]).await?;
        Ok(())
    }

    // ========================================================================
    // USER OPERATIONS
    // ========================================================================

    /// Insert a new user row.
    pub async fn user_insert(&self, user: &User) -> ApiResult<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO users (id, name, email, password_hash, role, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            &[
                &user.id,
                &user.name,
                &user.email,
                &user.password_hash,
                &user.role.as_db_str(),
                &user.is_active,
                &user.created_at,
                &user.updated_at,
            ],
        )
        .await?;
        Ok(())
    }

    /// Get a user by id.
    pub async fn user_get(&self, id: EntityId) -> ApiResult<Option<User>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS).as_str(),
                &[&id],
            )
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    /// Get a user by email.
    pub async fn user_get_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS).as_str(),
                &[&email],
            )
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    /// Update profile fields; absent values keep the current column.
    pub async fn user_update_profile(
        &self,
        id: EntityId,
        name: Option<&str>,
        password_hash: Option<&str>,
    ) -> ApiResult<Option<User>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                format!(
                    "UPDATE users SET name = COALESCE($2, name), \
                     password_hash = COALESCE($3, password_hash), updated_at = $4 \
                     WHERE id = $1 RETURNING {}",
                    USER_COLUMNS
                ).as_str(),
                &[&id, &name, &password_hash, &Utc::now()],
            )
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    /// List users, oldest first.
    pub async fn user_list(&self, skip: i64, limit: i64) -> ApiResult<Vec<User>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                format!(
                    "SELECT {} FROM users ORDER BY created_at OFFSET $1 LIMIT $2",
                    USER_COLUMNS
                ).as_str(),
                &[&skip, &limit],
            )
            .await?;
        rows.iter().map(user_from_row).collect()
    }

    pub async fn user_count(&self) -> ApiResult<i64> {
        let conn = self.get_conn().await?;
        let row = conn.query_one("SELECT COUNT(*) FROM users", &[]).await?;
        Ok(row.try_get(0)?)
    }

    // ========================================================================
    // API KEY OPERATIONS
    // ========================================================================

    pub async fn api_key_insert(&self, key: &ApiKey) -> ApiResult<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO api_keys (id, user_id, key_hash, key_prefix, name, is_active, created_at, last_used_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            &[
                &key.id,
                &key.user_id,
                &key.key_hash,
                &key.key_prefix,
                &key.name,
                &key.is_active,
                &key.created_at,
                &key.last_used_at,
                &key.expires_at,
            ],
        )
        .await?;
        Ok(())
    }

    /// List a user's API keys, newest first.
    pub async fn api_key_list(&self, user_id: EntityId) -> ApiResult<Vec<ApiKey>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                format!(
                    "SELECT {} FROM api_keys WHERE user_id = $1 ORDER BY created_at DESC",
                    API_KEY_COLUMNS
                ).as_str(),
                &[&user_id],
            )
            .await?;
        rows.iter().map(api_key_from_row).collect()
    }

    /// Deactivate one of the user's keys. Returns false when no row matched.
    pub async fn api_key_deactivate(&self, user_id: EntityId, key_id: EntityId) -> ApiResult<bool> {
        let conn = self.get_conn().await?;
        let affected = conn
            .execute(
                "UPDATE api_keys SET is_active = FALSE WHERE id = $1 AND user_id = $2",
                &[&key_id, &user_id],
            )
            .await?;
        Ok(affected > 0)
    }

    /// Resolve a plaintext API key to its row, stamping `last_used_at`.
    ///
    /// One atomic UPDATE: only usable keys (active, unexpired) match.
    pub async fn api_key_authenticate(&self, plaintext: &str) -> ApiResult<Option<ApiKey>> {
        let hash = sha256_hex(plaintext);
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                format!(
                    "UPDATE api_keys SET last_used_at = $2 \
                     WHERE key_hash = $1 AND is_active \
                       AND (expires_at IS NULL OR expires_at > $2) \
                     RETURNING {}",
                    API_KEY_COLUMNS
                ).as_str(),
                &[&hash, &Utc::now()],
            )
            .await?;
        row.as_ref().map(api_key_from_row).transpose()
    }

    // ========================================================================
    // TOOL OPERATIONS
    // ========================================================================

    pub async fn tool_insert(&self, tool: &Tool) -> ApiResult<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO tools (id, name, description, api_endpoint, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            &[
                &tool.id,
                &tool.name,
                &tool.description,
                &tool.api_endpoint,
                &tool.is_active,
                &tool.created_at,
                &tool.updated_at,
            ],
        )
        .await?;
        Ok(())
    }

    /// Get a tool by id regardless of active flag (admin view).
    pub async fn tool_get(&self, id: EntityId) -> ApiResult<Option<Tool>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                format!("SELECT {} FROM tools WHERE id = $1", TOOL_COLUMNS).as_str(),
                &[&id],
            )
            .await?;
        row.as_ref().map(tool_from_row).transpose()
    }

    /// Get a tool by id only if it is active (invocation path).
    pub async fn tool_get_active(&self, id: EntityId) -> ApiResult<Option<Tool>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                format!(
                    "SELECT {} FROM tools WHERE id = $1 AND is_active",
                    TOOL_COLUMNS
                ).as_str(),
                &[&id],
            )
            .await?;
        row.as_ref().map(tool_from_row).transpose()
    }

    /// List tools with pagination, optionally only active ones.
    pub async fn tool_list(
        &self,
        skip: i64,
        limit: i64,
        active_only: bool,
    ) -> ApiResult<Vec<Tool>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                format!(
                    "SELECT {} FROM tools WHERE ($3 = FALSE OR is_active) \
                     ORDER BY created_at OFFSET $1 LIMIT $2",
                    TOOL_COLUMNS
                ).as_str(),
                &[&skip, &limit, &active_only],
            )
            .await?;
        rows.iter().map(tool_from_row).collect()
    }

    /// Update tool fields; absent values keep the current column.
    pub async fn tool_update(
        &self,
        id: EntityId,
        name: Option<&str>,
        description: Option<&str>,
        api_endpoint: Option<&str>,
        is_active: Option<bool>,
    ) -> ApiResult<Option<Tool>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                format!(
                    "UPDATE tools SET name = COALESCE($2, name), \
                     description = COALESCE($3, description), \
                     api_endpoint = COALESCE($4, api_endpoint), \
                     is_active = COALESCE($5, is_active), updated_at = $6 \
                     WHERE id = $1 RETURNING {}",
                    TOOL_COLUMNS
                ).as_str(),
                &[&id, &name, &description, &api_endpoint, &is_active, &Utc::now()],
            )
            .await?;
        row.as_ref().map(tool_from_row).transpose()
    }

    /// Delete a tool. Returns false when no row matched.
    pub async fn tool_delete(&self, id: EntityId) -> ApiResult<bool> {
        let conn = self.get_conn().await?;
        let affected = conn
            .execute("DELETE FROM tools WHERE id = $1", &[&id])
            .await?;
        Ok(affected > 0)
    }

    pub async fn tool_count(&self) -> ApiResult<i64> {
        let conn = self.get_conn().await?;
        let row = conn.query_one("SELECT COUNT(*) FROM tools", &[]).await?;
        Ok(row.try_get(0)?)
    }

    // ========================================================================
    // SUBSCRIPTION OPERATIONS
    // ========================================================================

    pub async fn subscription_get(&self, user_id: EntityId) -> ApiResult<Option<Subscription>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                format!(
                    "SELECT {} FROM subscriptions WHERE user_id = $1",
                    SUBSCRIPTION_COLUMNS
                ).as_str(),
                &[&user_id],
            )
            .await?;
        row.as_ref().map(subscription_from_row).transpose()
    }

    /// Insert the subscription, or overwrite the user's existing row.
    ///
    /// The unique constraint on `user_id` plus ON CONFLICT enforces the
    /// one-row-per-user invariant: a re-subscribe overwrites in place (and
    /// keeps the original row id).
    pub async fn subscription_upsert(&self, subscription: &Subscription) -> ApiResult<Subscription> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                format!(
                    "INSERT INTO subscriptions \
                     (id, user_id, plan, status, token_limit, tokens_used, period_start, expires_at, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
                     ON CONFLICT (user_id) DO UPDATE SET \
                       plan = EXCLUDED.plan, status = EXCLUDED.status, \
                       token_limit = EXCLUDED.token_limit, tokens_used = EXCLUDED.tokens_used, \
                       period_start = EXCLUDED.period_start, expires_at = EXCLUDED.expires_at, \
                       updated_at = EXCLUDED.updated_at \
                     RETURNING {}",
                    SUBSCRIPTION_COLUMNS
                ).as_str(),
                &[
                    &subscription.id,
                    &subscription.user_id,
                    &subscription.plan.as_db_str(),
                    &subscription.status.as_db_str(),
                    &subscription.token_limit,
                    &subscription.tokens_used,
                    &subscription.period_start,
                    &subscription.expires_at,
                    &subscription.created_at,
                    &subscription.updated_at,
                ],
            )
            .await?;
        subscription_from_row(&row)
    }

    /// Set the status of the user's subscription, if one exists.
    pub async fn subscription_set_status(
        &self,
        user_id: EntityId,
        status: SubscriptionStatus,
    ) -> ApiResult<Option<Subscription>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                format!(
                    "UPDATE subscriptions SET status = $2, updated_at = $3 \
                     WHERE user_id = $1 RETURNING {}",
                    SUBSCRIPTION_COLUMNS
                ).as_str(),
                &[&user_id, &status.as_db_str(), &Utc::now()],
            )
            .await?;
        row.as_ref().map(subscription_from_row).transpose()
    }

    /// Atomically add `amount` to the user's consumed-token counter.
    ///
    /// Relative UPDATE on purpose: concurrent invocations must not lose
    /// increments, so the addition happens in the database, not in Rust.
    pub async fn subscription_increment_tokens(
        &self,
        user_id: EntityId,
        amount: i64,
    ) -> ApiResult<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "UPDATE subscriptions SET tokens_used = tokens_used + $2, updated_at = $3 \
             WHERE user_id = $1",
            &[&user_id, &amount, &Utc::now()],
        )
        .await?;
        Ok(())
    }

    pub async fn subscription_active_count(&self) -> ApiResult<i64> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                "SELECT COUNT(*) FROM subscriptions WHERE status = 'active'",
                &[],
            )
            .await?;
        Ok(row.try_get(0)?)
    }

    // ========================================================================
    // USAGE LOG OPERATIONS
    // ========================================================================

    /// Append one usage row. Rows are immutable; there is no update path.
    pub async fn usage_insert(&self, entry: &NewUsageLog) -> ApiResult<UsageLog> {
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

        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO usage_logs (id, user_id, tool_id, timestamp, tokens_used, request_id, response_status, duration_ms) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            &[
                &log.id,
                &log.user_id,
                &log.tool_id,
                &log.timestamp,
                &log.tokens_used,
                &log.request_id,
                &log.response_status.as_db_str(),
                &log.duration_ms,
            ],
        )
        .await?;
        Ok(log)
    }

    /// Usage history for a user, newest first, with optional date bounds.
    pub async fn usage_history(
        &self,
        user_id: EntityId,
        start_date: Option<Timestamp>,
        end_date: Option<Timestamp>,
        skip: i64,
        limit: i64,
    ) -> ApiResult<Vec<UsageLog>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                format!(
                    "SELECT {} FROM usage_logs WHERE user_id = $1 \
                     AND ($2::timestamptz IS NULL OR timestamp >= $2) \
                     AND ($3::timestamptz IS NULL OR timestamp <= $3) \
                     ORDER BY timestamp DESC OFFSET $4 LIMIT $5",
                    USAGE_LOG_COLUMNS
                ).as_str(),
                &[&user_id, &start_date, &end_date, &skip, &limit],
            )
            .await?;
        rows.iter().map(usage_log_from_row).collect()
    }

    /// Aggregated usage for a user: totals plus per-tool and per-day breakdowns.
    pub async fn usage_summary(
        &self,
        user_id: EntityId,
        start_date: Option<Timestamp>,
        end_date: Option<Timestamp>,
    ) -> ApiResult<UsageSummary> {
        let conn = self.get_conn().await?;

        let totals = conn
            .query_one(
                "SELECT COALESCE(SUM(tokens_used), 0)::bigint AS total_tokens, \
                        COUNT(*) AS total_requests, \
                        AVG(duration_ms::float8) AS avg_duration \
                 FROM usage_logs WHERE user_id = $1 \
                 AND ($2::timestamptz IS NULL OR timestamp >= $2) \
                 AND ($3::timestamptz IS NULL OR timestamp <= $3)",
                &[&user_id, &start_date, &end_date],
            )
            .await?;

        let by_tool = conn
            .query(
                "SELECT tool_id, COALESCE(SUM(tokens_used), 0)::bigint AS tokens_used, \
                        COUNT(*) AS request_count, AVG(duration_ms::float8) AS avg_duration \
                 FROM usage_logs WHERE user_id = $1 \
                 AND ($2::timestamptz IS NULL OR timestamp >= $2) \
                 AND ($3::timestamptz IS NULL OR timestamp <= $3) \
                 GROUP BY tool_id ORDER BY tokens_used DESC",
                &[&user_id, &start_date, &end_date],
            )
            .await?;

        let by_day = conn
            .query(
                "SELECT (timestamp AT TIME ZONE 'UTC')::date AS day, \
                        COALESCE(SUM(tokens_used), 0)::bigint AS tokens_used, \
                        COUNT(*) AS request_count, AVG(duration_ms::float8) AS avg_duration \
                 FROM usage_logs WHERE user_id = $1 \
                 AND ($2::timestamptz IS NULL OR timestamp >= $2) \
                 AND ($3::timestamptz IS NULL OR timestamp <= $3) \
                 GROUP BY day ORDER BY day",
                &[&user_id, &start_date, &end_date],
            )
            .await?;

        let breakdown_by_tool = by_tool
            .iter()
            .map(|row| {
                Ok(ToolUsageBreakdown {
                    tool_id: row.try_get("tool_id")?,
                    tokens_used: row.try_get("tokens_used")?,
                    request_count: row.try_get("request_count")?,
                    avg_duration_ms: row.try_get("avg_duration")?,
                })
            })
            .collect::<ApiResult<Vec<_>>>()?;

        let breakdown_by_day = by_day
            .iter()
            .map(|row| {
                Ok(DailyUsageBreakdown {
                    date: row.try_get("day")?,
                    tokens_used: row.try_get("tokens_used")?,
                    request_count: row.try_get("request_count")?,
                    avg_duration_ms: row.try_get("avg_duration")?,
                })
            })
            .collect::<ApiResult<Vec<_>>>()?;

        Ok(UsageSummary {
            total_tokens_used: totals.try_get("total_tokens")?,
            total_requests: totals.try_get("total_requests")?,
            avg_duration_ms: totals.try_get("avg_duration")?,
            breakdown_by_tool,
            breakdown_by_day,
        })
    }

    pub async fn usage_count(&self) -> ApiResult<i64> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one("SELECT COUNT(*) FROM usage_logs", &[])
            .await?;
        Ok(row.try_get(0)?)
    }

    /// Platform-wide per-tool usage statistics (admin).
    pub async fn platform_usage_by_tool(&self) -> ApiResult<Vec<PlatformToolStats>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "SELECT t.id AS tool_id, t.name AS tool_name, COUNT(u.id) AS usage_count, \
                        COALESCE(SUM(u.tokens_used), 0)::bigint AS total_tokens \
                 FROM tools t JOIN usage_logs u ON u.tool_id = t.id \
                 GROUP BY t.id, t.name ORDER BY total_tokens DESC",
                &[],
            )
            .await?;
        rows.iter()
            .map(|row| {
                Ok(PlatformToolStats {
                    tool_id: row.try_get("tool_id")?,
                    tool_name: row.try_get("tool_name")?,
                    usage_count: row.try_get("usage_count")?,
                    total_tokens: row.try_get("total_tokens")?,
                })
            })
            .collect()
    }

    /// Platform-wide per-day usage statistics (admin).
    pub async fn platform_usage_by_day(&self) -> ApiResult<Vec<PlatformDailyStats>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "SELECT (timestamp AT TIME ZONE 'UTC')::date AS day, COUNT(id) AS usage_count, \
                        COALESCE(SUM(tokens_used), 0)::bigint AS total_tokens \
                 FROM usage_logs GROUP BY day ORDER BY day",
                &[],
            )
            .await?;
        rows.iter()
            .map(|row| {
                Ok(PlatformDailyStats {
                    date: row.try_get("day")?,
                    usage_count: row.try_get("usage_count")?,
                    total_tokens: row.try_get("total_tokens")?,
                })
            })
            .collect()
    }

    // ========================================================================
    // REFRESH TOKEN OPERATIONS
    // ========================================================================

    pub async fn refresh_token_insert(&self, token: &RefreshToken) -> ApiResult<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, revoked, created_at, replaced_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            &[
                &token.id,
                &token.user_id,
                &token.token_hash,
                &token.expires_at,
                &token.revoked,
                &token.created_at,
                &token.replaced_by,
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn refresh_token_find_by_hash(
        &self,
        token_hash: &str,
    ) -> ApiResult<Option<RefreshToken>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                format!(
                    "SELECT {} FROM refresh_tokens WHERE token_hash = $1",
                    REFRESH_TOKEN_COLUMNS
                ).as_str(),
                &[&token_hash],
            )
            .await?;
        row.as_ref().map(refresh_token_from_row).transpose()
    }

    /// Revoke a refresh token, optionally recording its successor in the
    /// rotation chain. Returns false when no row matched.
    pub async fn refresh_token_revoke(
        &self,
        id: EntityId,
        replaced_by: Option<EntityId>,
    ) -> ApiResult<bool> {
        let conn = self.get_conn().await?;
        let affected = conn
            .execute(
                "UPDATE refresh_tokens SET revoked = TRUE, replaced_by = COALESCE($2, replaced_by) \
                 WHERE id = $1",
                &[&id, &replaced_by],
            )
            .await?;
        Ok(affected > 0)
    }
}

impl std::fmt::Debug for DbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.pool.status();
        f.debug_struct("DbClient")
            .field("pool_size", &status.size)
            .finish()
    }
}

// ============================================================================
// PIPELINE COLLABORATOR IMPLEMENTATIONS
// ============================================================================

fn storage_err(err: ApiError) -> StorageError {
    StorageError::Backend {
        reason: err.to_string(),
    }
}

#[async_trait]
impl ToolCatalog for DbClient {
    async fn get_active_tool(&self, tool_id: EntityId) -> Result<Option<Tool>, StorageError> {
        self.tool_get_active(tool_id).await.map_err(storage_err)
    }
}

#[async_trait]
impl SubscriptionStore for DbClient {
    async fn get_subscription(
        &self,
        user_id: EntityId,
    ) -> Result<Option<Subscription>, StorageError> {
        self.subscription_get(user_id).await.map_err(storage_err)
    }

    async fn increment_tokens_used(
        &self,
        user_id: EntityId,
        amount: i64,
    ) -> Result<(), StorageError> {
        self.subscription_increment_tokens(user_id, amount)
            .await
            .map_err(storage_err)
    }
}

#[async_trait]
impl UsageStore for DbClient {
    async fn append_usage_log(&self, entry: NewUsageLog) -> Result<UsageLog, StorageError> {
        self.usage_insert(&entry).await.map_err(storage_err)
    }
}
