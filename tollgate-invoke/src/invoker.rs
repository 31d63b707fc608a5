//! Outbound HTTP invoker.
//!
//! Translates transport outcomes into the invocation failure taxonomy:
//! timeouts become `InvokeError::Timeout`, non-2xx responses become
//! `UpstreamStatus`, everything else transport-shaped becomes `Transport`.
//! The invoker performs the network call and nothing else - usage recording
//! belongs to the pipeline.

use std::time::Duration;

use ::async_trait::async_trait;
use serde_json::Value as JsonValue;
use tollgate_core::{InvokeError, Tool};

/// Default overall timeout for one external tool call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// TRAIT
// ============================================================================

/// Performs the outbound call to a tool's endpoint.
///
/// Behind a trait so the pipeline can be exercised with scripted invokers in
/// tests; `HttpToolInvoker` is the production implementation.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// POST `input` as JSON to the tool's endpoint and parse the JSON reply.
    async fn invoke(&self, tool: &Tool, input: &JsonValue) -> Result<JsonValue, InvokeError>;
}

// ============================================================================
// HTTP IMPLEMENTATION
// ============================================================================

/// HTTP invoker with a fixed per-call timeout.
pub struct HttpToolInvoker {
    client: reqwest::Client,
    timeout: Duration,
    user_agent: String,
}

impl HttpToolInvoker {
    /// Create an invoker with the given overall call timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
            user_agent: format!("Tollgate/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for HttpToolInvoker {
    fn default() -> Self {
        Self::new(DEFAULT_CALL_TIMEOUT)
    }
}

#[async_trait]
impl ToolInvoker for HttpToolInvoker {
    async fn invoke(&self, tool: &Tool, input: &JsonValue) -> Result<JsonValue, InvokeError> {
        let response = self
            .client
            .post(&tool.api_endpoint)
            .header("Content-Type", "application/json")
            .header("User-Agent", &self.user_agent)
            .json(input)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InvokeError::Timeout
                } else {
                    InvokeError::Transport {
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(InvokeError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        response.json::<JsonValue>().await.map_err(|e| {
            if e.is_timeout() {
                InvokeError::Timeout
            } else {
                InvokeError::InvalidResponse {
                    reason: e.to_string(),
                }
            }
        })
    }
}

impl std::fmt::Debug for HttpToolInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpToolInvoker")
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
