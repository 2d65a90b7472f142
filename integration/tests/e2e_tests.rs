//! End-to-end tests across the breaker, shared counters and the HTTP adapter.

use anyhow::{Context, Result};
use breaker_http::{HttpBreaker, HttpConfig, build_http_client};
use breaker_store::CachedCounter;
use circuit_breaker::{
    BreakerError, BreakerSettings, CallError, CircuitBreaker, CircuitState, CounterFailurePolicy,
    ManualClock,
};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use test_utils::fixtures::{manual_config, sample_env, sample_settings, trip};
use test_utils::mocks::{FlakyCountsCache, RecordingListener, ScriptedOperation, Transition};
use test_utils::outcomes_strategy;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_full_cycle_with_shared_counter() -> Result<()> {
    let settings = sample_settings().context("sample settings")?;
    let listener = RecordingListener::new();
    let clock = ManualClock::new();
    let config = settings
        .into_config()
        .with_clock(clock.clone())
        .with_on_state_change(listener.clone());

    let cache = Arc::new(FlakyCountsCache::new());
    let breaker =
        CircuitBreaker::with_counter(config, CachedCounter::new(Arc::clone(&cache), "payments"))
            .await;
    let op = ScriptedOperation::new([false; 5]);

    for _ in 0..5 {
        let result = breaker.call(|| op.run()).await;
        assert!(matches!(result, Err(CallError::Operation(_))));
    }
    assert_eq!(breaker.state().await, CircuitState::Open);

    let rejected = breaker.call(|| op.run()).await;
    assert!(matches!(rejected, Err(CallError::Rejected(BreakerError::Open { .. }))));
    assert_eq!(op.calls(), 5);

    clock.advance(Duration::from_secs(15));
    assert_eq!(breaker.state().await, CircuitState::HalfOpen);

    for _ in 0..3 {
        breaker.call(|| op.run()).await?;
    }
    assert_eq!(breaker.state().await, CircuitState::Closed);

    assert_eq!(
        listener.transitions(),
        vec![
            Transition {
                name: "payments".to_string(),
                from: CircuitState::Closed,
                to: CircuitState::Open,
            },
            Transition {
                name: "payments".to_string(),
                from: CircuitState::Open,
                to: CircuitState::HalfOpen,
            },
            Transition {
                name: "payments".to_string(),
                from: CircuitState::HalfOpen,
                to: CircuitState::Closed,
            },
        ]
    );
    assert_eq!(cache.failed_ops(), 0);
    Ok(())
}

#[tokio::test]
async fn test_cache_outage_fail_open_keeps_admitting() {
    let (config, _clock) = manual_config("search");
    let cache = Arc::new(FlakyCountsCache::new());
    let breaker =
        CircuitBreaker::with_counter(config, CachedCounter::new(Arc::clone(&cache), "search"))
            .await;

    cache.go_down();
    for _ in 0..10 {
        let ticket = breaker.before_call().await.unwrap();
        breaker.after_call(ticket, false).await;
    }

    assert_eq!(breaker.state().await, CircuitState::Closed);
    assert!(cache.failed_ops() > 0);
    assert!(breaker.metrics().counter_errors.get() > 0);
}

#[tokio::test]
async fn test_cache_outage_fail_closed_rejects_until_recovery() {
    let (config, _clock) = manual_config("ledger");
    let config = config.with_counter_failure_policy(CounterFailurePolicy::FailClosed);
    let cache = Arc::new(FlakyCountsCache::new());
    let breaker =
        CircuitBreaker::with_counter(config, CachedCounter::new(Arc::clone(&cache), "ledger"))
            .await;

    cache.go_down();
    let err = breaker.before_call().await.unwrap_err();
    assert!(matches!(err, BreakerError::CounterUnavailable { .. }));
    assert!(!err.is_rejection());

    cache.recover();
    let ticket = breaker.before_call().await.unwrap();
    breaker.after_call(ticket, true).await;
    assert_eq!(breaker.counts().await.total_successes, 1);
}

#[tokio::test]
async fn test_instances_sharing_a_key_share_counts() {
    let cache = Arc::new(FlakyCountsCache::new());
    let (config_a, _) = manual_config("orders");
    let (config_b, _) = manual_config("orders");
    let counter_a = CachedCounter::new(Arc::clone(&cache), "orders");
    let counter_b = CachedCounter::new(Arc::clone(&cache), "orders");
    let a = CircuitBreaker::with_counter(config_a, counter_a).await;
    let b = CircuitBreaker::with_counter(config_b, counter_b).await;

    for _ in 0..3 {
        let ticket = a.before_call().await.unwrap();
        a.after_call(ticket, false).await;
    }
    for _ in 0..3 {
        let ticket = b.before_call().await.unwrap();
        b.after_call(ticket, false).await;
    }

    assert_eq!(a.state().await, CircuitState::Closed);
    assert_eq!(b.state().await, CircuitState::Open);
}

#[tokio::test]
async fn test_concurrent_callers_account_for_every_attempt() {
    let (config, _clock) = manual_config("fanout");
    let breaker = Arc::new(CircuitBreaker::new(config));
    let op = ScriptedOperation::new([false; 20]);

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let breaker = Arc::clone(&breaker);
            let op = op.clone();
            tokio::spawn(async move { breaker.call(|| op.run()).await })
        })
        .collect();

    let mut rejected = 0u64;
    for handle in handles {
        if let Err(CallError::Rejected(_)) = handle.await.unwrap() {
            rejected += 1;
        }
    }

    let metrics = breaker.metrics();
    assert_eq!(metrics.admitted.get() + rejected, 50);
    assert_eq!(metrics.admitted.get(), op.calls());
    assert_eq!(
        metrics.successes.get() + metrics.failures.get() + metrics.stale_outcomes.get(),
        metrics.admitted.get()
    );
}

#[tokio::test]
async fn test_http_adapter_exports_metrics() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let env = sample_env();
    let settings = BreakerSettings::from_lookup(|key| env.get(key).cloned())?;
    let breaker = Arc::new(CircuitBreaker::new(settings.into_config()));
    let client = build_http_client(&HttpConfig::default().with_timeout(Duration::from_secs(2)))?;
    let http =
        HttpBreaker::from_parts(client, Arc::clone(&breaker)).with_server_errors_as_failures();

    let mut failures = 0;
    while http.send(http.get(server.uri())).await.is_ok() {
        failures += 1;
    }
    assert_eq!(failures, 5);

    let text = breaker.metrics().to_prometheus();
    assert!(text.contains("payments_circuit_failures_total 5\n"));
    assert!(text.contains("payments_circuit_rejected_open_total 1\n"));
    assert!(text.contains("payments_circuit_state 2\n"));
    Ok(())
}

#[tokio::test]
async fn test_trip_fixture_respects_threshold() {
    let (config, _clock) = manual_config("fixture");
    let breaker = CircuitBreaker::new(config);

    assert_eq!(trip(&breaker, 3).await, 3);
    assert_eq!(breaker.state().await, CircuitState::Closed);
    assert_eq!(trip(&breaker, 10).await, 3);
    assert_eq!(breaker.state().await, CircuitState::Open);
}

// **Property: Transitions Form A Chain**
// *For any* sequence of outcomes and open periods, every reported transition
// starts from the state the previous one ended in, and every admitted call is
// accounted for exactly once.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_transitions_form_a_chain(outcomes in outcomes_strategy(60)) {
        tokio_test::block_on(async {
            let listener = RecordingListener::new();
            let (config, clock) = manual_config("chain");
            let breaker = CircuitBreaker::new(config.with_on_state_change(listener.clone()));
            let mut attempts = 0u64;
            let mut rejections = 0u64;

            for success in outcomes {
                attempts += 1;
                match breaker.before_call().await {
                    Ok(ticket) => breaker.after_call(ticket, success).await,
                    Err(_) => {
                        rejections += 1;
                        clock.advance(Duration::from_secs(60));
                    }
                }
            }

            let final_state = breaker.state().await;
            let mut previous = CircuitState::Closed;
            for transition in listener.transitions() {
                prop_assert_eq!(transition.from, previous);
                prop_assert_ne!(transition.from, transition.to);
                previous = transition.to;
            }
            prop_assert_eq!(final_state, previous);

            let metrics = breaker.metrics();
            prop_assert_eq!(metrics.admitted.get() + rejections, attempts);
            prop_assert_eq!(
                metrics.successes.get() + metrics.failures.get(),
                metrics.admitted.get()
            );
            Ok(())
        })?;
    }
}
