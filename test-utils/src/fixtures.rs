//! Test fixtures with sample settings and breakers.

use circuit_breaker::{
    BreakerConfig, BreakerSettings, CircuitBreaker, CircuitState, Counter, ManualClock,
};
use std::collections::HashMap;

/// Settings document as it would appear in a service's config file.
pub const SAMPLE_SETTINGS_JSON: &str = r#"{
    "name": "payments",
    "max_requests": 3,
    "interval_ms": 30000,
    "timeout_ms": 15000,
    "consecutive_failures": 4,
    "counter_failure_policy": "fail_closed"
}"#;

/// Settings matching [`SAMPLE_SETTINGS_JSON`].
///
/// # Errors
///
/// Returns an error if the sample document fails to deserialize.
pub fn sample_settings() -> Result<BreakerSettings, serde_json::Error> {
    serde_json::from_str(SAMPLE_SETTINGS_JSON)
}

/// `BREAKER_*` variables equivalent to [`SAMPLE_SETTINGS_JSON`], for
/// [`BreakerSettings::from_lookup`].
#[must_use]
pub fn sample_env() -> HashMap<String, String> {
    [
        ("BREAKER_NAME", "payments"),
        ("BREAKER_MAX_REQUESTS", "3"),
        ("BREAKER_INTERVAL_MS", "30000"),
        ("BREAKER_TIMEOUT_MS", "15000"),
        ("BREAKER_CONSECUTIVE_FAILURES", "4"),
        ("BREAKER_COUNTER_FAILURE_POLICY", "fail-closed"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Default configuration driven by a fresh manual clock.
#[must_use]
pub fn manual_config(name: &str) -> (BreakerConfig, ManualClock) {
    let clock = ManualClock::new();
    (BreakerConfig::new(name).with_clock(clock.clone()), clock)
}

/// Record failures until the breaker leaves the closed state, returning how
/// many it took. Gives up after `limit` attempts.
pub async fn trip<C: Counter>(breaker: &CircuitBreaker<C>, limit: u32) -> u32 {
    let mut failures = 0;
    while failures < limit {
        let Ok(ticket) = breaker.before_call().await else {
            break;
        };
        breaker.after_call(ticket, false).await;
        failures += 1;
        if breaker.state().await != CircuitState::Closed {
            break;
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use circuit_breaker::CounterFailurePolicy;

    #[test]
    fn test_sample_sources_agree() {
        let from_json = sample_settings().unwrap();
        let env = sample_env();
        let from_env = BreakerSettings::from_lookup(|key| env.get(key).cloned()).unwrap();

        assert_eq!(from_json, from_env);
        assert_eq!(from_json.counter_failure_policy, CounterFailurePolicy::FailClosed);
    }

    #[tokio::test]
    async fn test_trip_default_breaker() {
        let (config, _clock) = manual_config("db");
        let breaker = CircuitBreaker::new(config);

        assert_eq!(trip(&breaker, 100).await, 6);
        assert_eq!(breaker.state().await, CircuitState::Open);
    }
}
