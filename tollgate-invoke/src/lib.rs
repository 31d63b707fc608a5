//! Tollgate Invoke - Tool Invocation Pipeline
//!
//! The metered execution path for external tools:
//! - `CircuitBreaker` / `BreakerRegistry` - per-tool failure isolation
//! - `ToolInvoker` / `HttpToolInvoker` - the outbound HTTP call
//! - `response_token_cost` - placeholder token metering
//! - `InvocationPipeline` - guard checks, breaker-gated execution, usage
//!   recording, and the uniform invocation outcome
//!
//! Storage collaborators come from tollgate-storage; the pipeline holds them
//! as trait objects so tests can run against the in-memory store.

pub mod breaker;
pub mod cost;
pub mod invoker;
pub mod pipeline;

pub use breaker::{BreakerRegistry, CircuitBreaker, CircuitBreakerConfig};
pub use cost::response_token_cost;
pub use invoker::{HttpToolInvoker, ToolInvoker, DEFAULT_CALL_TIMEOUT};
pub use pipeline::{InvocationOutcome, InvocationPipeline};
