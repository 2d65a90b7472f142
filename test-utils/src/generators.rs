//! Shared proptest generators.

use circuit_breaker::{BreakerSettings, CounterFailurePolicy};
use proptest::prelude::*;

/// Generate a call outcome, `true` for success. Failures are weighted up so
/// sequences regularly trip a default breaker.
pub fn outcome_strategy() -> impl Strategy<Value = bool> {
    prop_oneof![
        3 => Just(true),
        2 => Just(false),
    ]
}

/// Generate a sequence of call outcomes.
pub fn outcomes_strategy(max_len: usize) -> impl Strategy<Value = Vec<bool>> {
    proptest::collection::vec(outcome_strategy(), 0..max_len)
}

/// Generate valid breaker names.
pub fn breaker_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{2,20}"
}

/// Generate a counter failure policy.
pub fn counter_failure_policy_strategy() -> impl Strategy<Value = CounterFailurePolicy> {
    prop_oneof![
        Just(CounterFailurePolicy::FailOpen),
        Just(CounterFailurePolicy::FailClosed),
    ]
}

/// Generate breaker settings within sensible operating ranges.
pub fn breaker_settings_strategy() -> impl Strategy<Value = BreakerSettings> {
    (
        breaker_name_strategy(),
        1u32..10,
        prop_oneof![Just(0u64), 1_000u64..120_000],
        1_000u64..120_000,
        0u32..20,
        counter_failure_policy_strategy(),
    )
        .prop_map(
            |(name, max_requests, interval_ms, timeout_ms, consecutive_failures, policy)| {
                BreakerSettings {
                    name,
                    max_requests,
                    interval_ms,
                    timeout_ms,
                    consecutive_failures,
                    counter_failure_policy: policy,
                }
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_generated_names_are_valid(name in breaker_name_strategy()) {
            prop_assert!(name.len() >= 3);
            prop_assert!(name.chars().next().is_some_and(|c| c.is_ascii_lowercase()));
        }

        #[test]
        fn test_generated_settings_are_usable(settings in breaker_settings_strategy()) {
            let config = settings.clone().into_config();
            prop_assert_eq!(config.name(), settings.name.as_str());
            prop_assert_eq!(config.max_requests(), settings.max_requests);
            prop_assert!(!config.timeout().is_zero());
        }
    }
}
