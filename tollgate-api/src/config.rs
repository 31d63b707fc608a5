//! API Configuration Module
//!
//! CORS and invocation settings loaded from environment variables with
//! sensible defaults for development. Circuit-breaker thresholds live with
//! the breaker (`CircuitBreakerConfig::from_env`); database settings live
//! with the pool (`DbConfig::from_env`).

use std::time::Duration;

use tollgate_invoke::DEFAULT_CALL_TIMEOUT;

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration for CORS and external-call behavior.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    /// Overall timeout for one external tool call.
    pub external_call_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(), // Empty = allow all
            cors_allow_credentials: false,
            cors_max_age_secs: 86400, // 24 hours
            external_call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TOLLGATE_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `TOLLGATE_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `TOLLGATE_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `TOLLGATE_CALL_TIMEOUT_SECS`: External tool call timeout (default: 30)
    pub fn from_env() -> Self {
        let cors_origins = std::env::var("TOLLGATE_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_allow_credentials = std::env::var("TOLLGATE_CORS_ALLOW_CREDENTIALS")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        let cors_max_age_secs = std::env::var("TOLLGATE_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(86400);

        let external_call_timeout = Duration::from_secs(
            std::env::var("TOLLGATE_CALL_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CALL_TIMEOUT.as_secs()),
        );

        Self {
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs,
            external_call_timeout,
        }
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert!(config.cors_origins.is_empty());
        assert!(!config.cors_allow_credentials);
        assert_eq!(config.cors_max_age_secs, 86400);
        assert_eq!(config.external_call_timeout, Duration::from_secs(30));
        assert!(!config.is_production());
    }

    #[test]
    fn test_is_production() {
        let mut config = ApiConfig::default();
        config.cors_origins = vec!["https://tollgate.dev".to_string()];
        assert!(config.is_production());
    }
}
