//! Tracing bootstrap for the API process.
//!
//! Structured logging via `tracing-subscriber`, with JSON output for
//! production log pipelines and human-readable output for development.

use tracing_subscriber::EnvFilter;

/// Telemetry configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Default filter directive when `RUST_LOG` is unset (e.g. "info").
    pub log_level: String,
    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Create TelemetryConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `TOLLGATE_LOG_LEVEL`: Filter directive when `RUST_LOG` is unset (default: info)
    /// - `TOLLGATE_LOG_FORMAT`: "json" or "standard" (default: standard)
    pub fn from_env() -> Self {
        Self {
            log_level: std::env::var("TOLLGATE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            json: std::env::var("TOLLGATE_LOG_FORMAT")
                .map(|s| s.to_lowercase() == "json")
                .unwrap_or(false),
        }
    }
}

/// Install the global tracing subscriber. Call once, at process start.
pub fn init_telemetry(config: &TelemetryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    if config.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
