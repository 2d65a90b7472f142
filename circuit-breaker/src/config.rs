//! Breaker configuration.
//!
//! [`BreakerConfig`] is the runtime configuration and carries the strategy
//! objects. [`BreakerSettings`] is its declarative, serde-friendly subset for
//! loading from files or the environment.

use crate::clock::{Clock, SystemClock};
use crate::error::SettingsError;
use crate::policy::{ConsecutiveFailures, NoError, StateListener, SuccessPolicy, TripPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Default open-state duration before probing.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default half-open probe budget.
pub const DEFAULT_MAX_REQUESTS: u32 = 1;

/// What the breaker does when its counter backend fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterFailurePolicy {
    /// Log the failure, treat unreadable counts as zero and keep admitting.
    #[default]
    FailOpen,
    /// Log the failure and reject admission with
    /// [`BreakerError::CounterUnavailable`](crate::BreakerError::CounterUnavailable).
    FailClosed,
}

impl FromStr for CounterFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail_open" | "fail-open" | "open" => Ok(Self::FailOpen),
            "fail_closed" | "fail-closed" | "closed" => Ok(Self::FailClosed),
            other => Err(format!("unknown counter failure policy: {other}")),
        }
    }
}

/// Circuit breaker configuration. Immutable once handed to the breaker.
#[derive(Clone)]
pub struct BreakerConfig {
    pub(crate) name: String,
    pub(crate) max_requests: u32,
    pub(crate) interval: Duration,
    pub(crate) timeout: Duration,
    pub(crate) ready_to_trip: Arc<dyn TripPolicy>,
    pub(crate) is_successful: Arc<dyn SuccessPolicy>,
    pub(crate) on_state_change: Option<Arc<dyn StateListener>>,
    pub(crate) counter_failure_policy: CounterFailurePolicy,
    pub(crate) clock: Arc<dyn Clock>,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            max_requests: DEFAULT_MAX_REQUESTS,
            interval: Duration::ZERO,
            timeout: DEFAULT_TIMEOUT,
            ready_to_trip: Arc::new(ConsecutiveFailures::default()),
            is_successful: Arc::new(NoError),
            on_state_change: None,
            counter_failure_policy: CounterFailurePolicy::default(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl BreakerConfig {
    /// Create a default configuration for the named breaker.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the half-open probe budget. Zero is treated as one.
    #[must_use]
    pub const fn with_max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = if max_requests == 0 {
            DEFAULT_MAX_REQUESTS
        } else {
            max_requests
        };
        self
    }

    /// Set the closed-state counting interval. Zero disables periodic resets.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set how long the breaker stays open. Zero falls back to the default.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = if timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            timeout
        };
        self
    }

    /// Set the closed → open predicate.
    #[must_use]
    pub fn with_ready_to_trip(mut self, policy: impl TripPolicy + 'static) -> Self {
        self.ready_to_trip = Arc::new(policy);
        self
    }

    /// Set the outcome classifier used by
    /// [`CircuitBreaker::call`](crate::CircuitBreaker::call).
    #[must_use]
    pub fn with_is_successful(mut self, policy: impl SuccessPolicy + 'static) -> Self {
        self.is_successful = Arc::new(policy);
        self
    }

    /// Register a state change listener.
    #[must_use]
    pub fn with_on_state_change(mut self, listener: impl StateListener + 'static) -> Self {
        self.on_state_change = Some(Arc::new(listener));
        self
    }

    /// Choose how counter backend failures affect admission.
    #[must_use]
    pub const fn with_counter_failure_policy(mut self, policy: CounterFailurePolicy) -> Self {
        self.counter_failure_policy = policy;
        self
    }

    /// Replace the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Breaker name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Half-open probe budget.
    #[must_use]
    pub const fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Closed-state counting interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Open-state duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Counter failure policy.
    #[must_use]
    pub const fn counter_failure_policy(&self) -> CounterFailurePolicy {
        self.counter_failure_policy
    }
}

impl fmt::Debug for BreakerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerConfig")
            .field("name", &self.name)
            .field("max_requests", &self.max_requests)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("on_state_change", &self.on_state_change.is_some())
            .field("counter_failure_policy", &self.counter_failure_policy)
            .finish_non_exhaustive()
    }
}

/// Declarative breaker settings.
///
/// Every field has a default, so partial documents deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Breaker name
    pub name: String,
    /// Half-open probe budget
    pub max_requests: u32,
    /// Closed-state counting interval in milliseconds (0 disables)
    pub interval_ms: u64,
    /// Open-state duration in milliseconds
    pub timeout_ms: u64,
    /// Trip once consecutive failures exceed this value
    pub consecutive_failures: u32,
    /// Counter backend failure handling
    pub counter_failure_policy: CounterFailurePolicy,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            name: "circuit-breaker".to_string(),
            max_requests: DEFAULT_MAX_REQUESTS,
            interval_ms: 0,
            timeout_ms: u64::try_from(DEFAULT_TIMEOUT.as_millis()).unwrap_or(60_000),
            consecutive_failures: ConsecutiveFailures::default().0,
            counter_failure_policy: CounterFailurePolicy::default(),
        }
    }
}

impl BreakerSettings {
    /// Load settings from `BREAKER_*` environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(name) = lookup("BREAKER_NAME") {
            settings.name = name;
        }
        if let Some(v) = parse_var(&lookup, "BREAKER_MAX_REQUESTS")? {
            settings.max_requests = v;
        }
        if let Some(v) = parse_var(&lookup, "BREAKER_INTERVAL_MS")? {
            settings.interval_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "BREAKER_TIMEOUT_MS")? {
            settings.timeout_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "BREAKER_CONSECUTIVE_FAILURES")? {
            settings.consecutive_failures = v;
        }
        if let Some(v) = parse_var(&lookup, "BREAKER_COUNTER_FAILURE_POLICY")? {
            settings.counter_failure_policy = v;
        }

        Ok(settings)
    }

    /// Build a runtime configuration from these settings.
    #[must_use]
    pub fn into_config(self) -> BreakerConfig {
        BreakerConfig::new(self.name)
            .with_max_requests(self.max_requests)
            .with_interval(Duration::from_millis(self.interval_ms))
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_ready_to_trip(ConsecutiveFailures(self.consecutive_failures))
            .with_counter_failure_policy(self.counter_failure_policy)
    }
}

fn parse_var<T, F>(lookup: &F, var: &str) -> Result<Option<T>, SettingsError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|value| {
            value.trim().parse().map_err(|_| SettingsError::Invalid {
                var: var.to_string(),
                value,
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = BreakerConfig::default();
        assert_eq!(config.max_requests(), 1);
        assert_eq!(config.interval(), Duration::ZERO);
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(
            config.counter_failure_policy(),
            CounterFailurePolicy::FailOpen
        );
    }

    #[test]
    fn test_zero_values_normalised() {
        let config = BreakerConfig::new("db")
            .with_max_requests(0)
            .with_timeout(Duration::ZERO);
        assert_eq!(config.max_requests(), 1);
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_config_builder() {
        let config = BreakerConfig::new("payments")
            .with_max_requests(3)
            .with_interval(Duration::from_secs(10))
            .with_timeout(Duration::from_secs(5))
            .with_counter_failure_policy(CounterFailurePolicy::FailClosed);

        assert_eq!(config.name(), "payments");
        assert_eq!(config.max_requests(), 3);
        assert_eq!(config.interval(), Duration::from_secs(10));
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(
            config.counter_failure_policy(),
            CounterFailurePolicy::FailClosed
        );
    }

    #[test]
    fn test_settings_partial_document() {
        let settings: BreakerSettings = serde_json::from_str(
            r#"{"name": "inventory", "timeout_ms": 1500, "counter_failure_policy": "fail_closed"}"#,
        )
        .unwrap();

        assert_eq!(settings.name, "inventory");
        assert_eq!(settings.timeout_ms, 1500);
        assert_eq!(settings.max_requests, 1);
        assert_eq!(settings.consecutive_failures, 5);
        assert_eq!(
            settings.counter_failure_policy,
            CounterFailurePolicy::FailClosed
        );

        let config = settings.into_config();
        assert_eq!(config.timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn test_settings_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("BREAKER_NAME", "search"),
            ("BREAKER_MAX_REQUESTS", "4"),
            ("BREAKER_INTERVAL_MS", "10000"),
            ("BREAKER_COUNTER_FAILURE_POLICY", "fail-closed"),
        ]
        .into_iter()
        .collect();

        let settings =
            BreakerSettings::from_lookup(|key| vars.get(key).map(ToString::to_string)).unwrap();

        assert_eq!(settings.name, "search");
        assert_eq!(settings.max_requests, 4);
        assert_eq!(settings.interval_ms, 10_000);
        assert_eq!(settings.timeout_ms, 60_000);
        assert_eq!(
            settings.counter_failure_policy,
            CounterFailurePolicy::FailClosed
        );
    }

    #[test]
    fn test_settings_invalid_value() {
        let result = BreakerSettings::from_lookup(|key| {
            (key == "BREAKER_TIMEOUT_MS").then(|| "soon".to_string())
        });

        match result {
            Err(SettingsError::Invalid { var, value }) => {
                assert_eq!(var, "BREAKER_TIMEOUT_MS");
                assert_eq!(value, "soon");
            }
            other => panic!("expected invalid setting, got {other:?}"),
        }
    }
}
