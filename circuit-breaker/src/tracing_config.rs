//! Logging setup for services embedding breakers.
//!
//! Breakers log transitions at `info`, counter failures at `warn` and
//! per-call decisions at `debug`. This module wires a `tracing-subscriber`
//! registry with sensible filters for those targets.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Targets that carry breaker events.
const BREAKER_TARGETS: [&str; 3] = ["circuit_breaker", "breaker_store", "breaker_http"];

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default level for everything else
    pub log_level: String,
    /// Level applied to the breaker crates
    pub breaker_level: String,
    /// Whether to output JSON format
    pub json_output: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            breaker_level: "info".to_string(),
            json_output: false,
        }
    }
}

impl TracingConfig {
    /// Set the default log level.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the level for breaker events, e.g. `debug` to see every
    /// admission decision.
    #[must_use]
    pub fn with_breaker_level(mut self, level: impl Into<String>) -> Self {
        self.breaker_level = level.into();
        self
    }

    /// Enable JSON output.
    #[must_use]
    pub const fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }

    /// Filter directives used when `RUST_LOG` is unset.
    #[must_use]
    pub fn directives(&self) -> String {
        std::iter::once(self.log_level.clone())
            .chain(
                BREAKER_TARGETS
                    .iter()
                    .map(|target| format!("{target}={}", self.breaker_level)),
            )
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Initialize the global subscriber. `RUST_LOG` takes precedence over the
/// configured directives.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(config: &TracingConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.directives()));

    if config.json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    }
}
