//! Per-tool circuit breakers.
//!
//! A breaker trips to `Open` after a configurable number of consecutive
//! failures, rejects everything until the cooldown elapses, then lets exactly
//! one probe through (`HalfOpen`). The probe's outcome decides between
//! `Closed` and another full cooldown.
//!
//! State lives in an `AtomicU8` (see `CircuitState`); the open → half-open
//! transition is a compare-and-swap so that concurrent callers racing for the
//! probe slot admit at most one.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tollgate_core::{CircuitState, EntityId, InvokeError};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for circuit breakers.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays open before admitting a probe.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create CircuitBreakerConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `TOLLGATE_CIRCUIT_FAILURE_THRESHOLD`: Consecutive failures before opening (default: 5)
    /// - `TOLLGATE_CIRCUIT_COOLDOWN_SECS`: How long the circuit stays open (default: 60)
    pub fn from_env() -> Self {
        let failure_threshold = std::env::var("TOLLGATE_CIRCUIT_FAILURE_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let cooldown = Duration::from_secs(
            std::env::var("TOLLGATE_CIRCUIT_COOLDOWN_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
        );

        Self {
            failure_threshold,
            cooldown,
        }
    }
}

// ============================================================================
// CIRCUIT BREAKER
// ============================================================================

/// Circuit breaker for one tool endpoint.
pub struct CircuitBreaker {
    state: AtomicU8,
    failure_count: AtomicU32,
    last_failure: RwLock<Option<Instant>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: AtomicU8::new(CircuitState::Closed as u8),
            failure_count: AtomicU32::new(0),
            last_failure: RwLock::new(None),
            config,
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::SeqCst))
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::SeqCst)
    }

    /// Try to claim admission for one call.
    ///
    /// - `Closed`: always admitted.
    /// - `Open`: rejected until the cooldown has elapsed; the first caller
    ///   past the cooldown wins the CAS into `HalfOpen` and becomes the probe.
    /// - `HalfOpen`: rejected, a probe is already in flight.
    pub fn try_acquire(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => false,
            CircuitState::Open => {
                let cooled_down = match self.last_failure.read() {
                    Ok(guard) => guard
                        .map(|last| last.elapsed() >= self.config.cooldown)
                        .unwrap_or(true),
                    Err(_) => false,
                };
                if !cooled_down {
                    return false;
                }
                self.state
                    .compare_exchange(
                        CircuitState::Open as u8,
                        CircuitState::HalfOpen as u8,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    )
                    .is_ok()
            }
        }
    }

    /// Record a successful call: reset failures and close the circuit.
    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::SeqCst);
        self.state.store(CircuitState::Closed as u8, Ordering::SeqCst);
        if let Ok(mut guard) = self.last_failure.write() {
            *guard = None;
        }
    }

    /// Record a failed call.
    ///
    /// Opens the circuit once the consecutive-failure threshold is reached;
    /// a failed half-open probe reopens immediately and restarts the cooldown.
    pub fn record_failure(&self) {
        let failures = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut guard) = self.last_failure.write() {
            *guard = Some(Instant::now());
        }

        let state = self.state();
        if state == CircuitState::HalfOpen || failures >= self.config.failure_threshold {
            self.state.store(CircuitState::Open as u8, Ordering::SeqCst);
        }
    }

    /// Execute `operation` under this breaker.
    ///
    /// Rejects immediately with `CircuitOpen` when no admission is available:
    /// the operation future is never polled, so an open circuit costs no
    /// latency and no network attempt.
    pub async fn execute<T, F>(&self, tool_id: EntityId, operation: F) -> Result<T, InvokeError>
    where
        F: Future<Output = Result<T, InvokeError>>,
    {
        if !self.try_acquire() {
            return Err(InvokeError::CircuitOpen { tool_id });
        }

        match operation.await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("state", &self.state())
            .field("failure_count", &self.failure_count())
            .finish()
    }
}

// ============================================================================
// BREAKER REGISTRY
// ============================================================================

/// Process-wide registry of per-tool breakers.
///
/// Owned by the pipeline and constructed once at startup; breakers are
/// created lazily on first use and kept for the process lifetime. Nothing is
/// persisted: a restart starts every tool closed.
pub struct BreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<EntityId, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Get the breaker for a tool, creating it on first use.
    pub fn breaker_for(&self, tool_id: EntityId) -> Arc<CircuitBreaker> {
        if let Ok(breakers) = self.breakers.read() {
            if let Some(breaker) = breakers.get(&tool_id) {
                return Arc::clone(breaker);
            }
        }

        let mut breakers = match self.breakers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(
            breakers
                .entry(tool_id)
                .or_insert_with(|| Arc::new(CircuitBreaker::new(self.config.clone()))),
        )
    }

    /// Peek at an existing breaker without creating one.
    pub fn get(&self, tool_id: EntityId) -> Option<Arc<CircuitBreaker>> {
        self.breakers
            .read()
            .ok()
            .and_then(|breakers| breakers.get(&tool_id).map(Arc::clone))
    }
}

impl std::fmt::Debug for BreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.breakers.read().map(|b| b.len()).unwrap_or(0);
        f.debug_struct("BreakerRegistry")
            .field("config", &self.config)
            .field("breakers", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_core::new_entity_id;

    fn test_config(threshold: u32, cooldown_ms: u64) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: threshold,
            cooldown: Duration::from_millis(cooldown_ms),
        }
    }

    #[test]
    fn test_closed_admits_calls() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::default());
        assert!(cb.try_acquire());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_threshold_opens_circuit() {
        let cb = CircuitBreaker::new(test_config(3, 60_000));

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.try_acquire());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = CircuitBreaker::new(test_config(3, 60_000));

        cb.record_failure();
        cb.record_failure();
        cb.record_success();

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 2);
    }

    #[test]
    fn test_cooldown_admits_single_probe() {
        let cb = CircuitBreaker::new(test_config(1, 20));

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.try_acquire());

        std::thread::sleep(Duration::from_millis(40));

        // First caller past the cooldown wins the probe slot; everyone else
        // stays rejected until the probe resolves.
        assert!(cb.try_acquire());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(!cb.try_acquire());
        assert!(!cb.try_acquire());
    }

    #[test]
    fn test_probe_success_closes_circuit() {
        let cb = CircuitBreaker::new(test_config(1, 20));

        cb.record_failure();
        std::thread::sleep(Duration::from_millis(40));
        assert!(cb.try_acquire());

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
        assert!(cb.try_acquire());
    }

    #[test]
    fn test_probe_failure_reopens_and_restarts_cooldown() {
        let cb = CircuitBreaker::new(test_config(1, 50));

        cb.record_failure();
        std::thread::sleep(Duration::from_millis(70));
        assert!(cb.try_acquire());

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        // Cooldown restarted by the probe failure: still rejecting.
        assert!(!cb.try_acquire());
    }

    #[tokio::test]
    async fn test_execute_skips_operation_when_open() {
        let cb = CircuitBreaker::new(test_config(1, 60_000));
        let tool_id = new_entity_id();
        cb.record_failure();

        let mut invoked = false;
        let result = cb
            .execute(tool_id, async {
                invoked = true;
                Ok::<_, InvokeError>(())
            })
            .await;

        assert_eq!(result, Err(InvokeError::CircuitOpen { tool_id }));
        assert!(!invoked);
    }

    #[tokio::test]
    async fn test_execute_records_outcomes() {
        let cb = CircuitBreaker::new(test_config(2, 60_000));
        let tool_id = new_entity_id();

        let err = cb
            .execute(tool_id, async { Err::<(), _>(InvokeError::Timeout) })
            .await;
        assert_eq!(err, Err(InvokeError::Timeout));
        assert_eq!(cb.failure_count(), 1);

        let ok = cb.execute(tool_id, async { Ok::<_, InvokeError>(7) }).await;
        assert_eq!(ok, Ok(7));
        assert_eq!(cb.failure_count(), 0);
    }

    #[test]
    fn test_registry_reuses_breaker_per_tool() {
        let registry = BreakerRegistry::new(test_config(1, 60_000));
        let tool_a = new_entity_id();
        let tool_b = new_entity_id();

        let first = registry.breaker_for(tool_a);
        first.record_failure();

        // Same tool sees the tripped breaker; a different tool gets a fresh one.
        assert_eq!(registry.breaker_for(tool_a).state(), CircuitState::Open);
        assert_eq!(registry.breaker_for(tool_b).state(), CircuitState::Closed);
        assert!(registry.get(tool_a).is_some());
    }
}
