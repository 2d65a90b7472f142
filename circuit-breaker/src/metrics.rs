//! Prometheus-style breaker metrics.
//!
//! Every breaker owns a [`BreakerMetrics`] updated from inside admission and
//! outcome recording. Rendering is plain Prometheus text.

use crate::state::CircuitState;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter metric.
#[derive(Debug)]
pub struct MetricCounter {
    name: String,
    help: String,
    value: AtomicU64,
}

impl MetricCounter {
    /// Create a new counter.
    #[must_use]
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            value: AtomicU64::new(0),
        }
    }

    /// Increment by one.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Metric name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Format as Prometheus text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP {} {}\n# TYPE {} counter\n{} {}\n",
            self.name,
            self.help,
            self.name,
            self.name,
            self.get()
        )
    }
}

/// Gauge metric.
#[derive(Debug)]
pub struct Gauge {
    name: String,
    help: String,
    value: AtomicU64,
}

impl Gauge {
    /// Create a new gauge.
    #[must_use]
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            value: AtomicU64::new(0),
        }
    }

    /// Set the value.
    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Format as Prometheus text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP {} {}\n# TYPE {} gauge\n{} {}\n",
            self.name,
            self.help,
            self.name,
            self.name,
            self.get()
        )
    }
}

/// Per-breaker metrics.
#[derive(Debug)]
pub struct BreakerMetrics {
    /// Calls admitted
    pub admitted: MetricCounter,
    /// Calls rejected because the circuit was open
    pub rejected_open: MetricCounter,
    /// Calls rejected because the half-open probe budget was exhausted
    pub rejected_too_many: MetricCounter,
    /// Successful outcomes recorded
    pub successes: MetricCounter,
    /// Failed outcomes recorded
    pub failures: MetricCounter,
    /// Outcomes dropped because their generation had ended
    pub stale_outcomes: MetricCounter,
    /// Admitted calls dropped before reporting an outcome
    pub abandoned: MetricCounter,
    /// State transitions
    pub transitions: MetricCounter,
    /// Counter backend errors
    pub counter_errors: MetricCounter,
    /// Current state (0 closed, 1 half-open, 2 open)
    pub state: Gauge,
}

impl BreakerMetrics {
    /// Create metrics for the named breaker.
    ///
    /// The name is folded into a metric prefix: anything other than ASCII
    /// alphanumerics becomes `_`.
    #[must_use]
    pub fn new(breaker_name: &str) -> Self {
        let prefix = metric_prefix(breaker_name);
        let counter = |suffix: &str, help: &str| {
            MetricCounter::new(format!("{prefix}_circuit_{suffix}"), help)
        };

        Self {
            admitted: counter("admitted_total", "Calls admitted by the circuit breaker"),
            rejected_open: counter(
                "rejected_open_total",
                "Calls rejected while the circuit was open",
            ),
            rejected_too_many: counter(
                "rejected_too_many_requests_total",
                "Calls rejected while the half-open probe budget was exhausted",
            ),
            successes: counter("successes_total", "Successful outcomes recorded"),
            failures: counter("failures_total", "Failed outcomes recorded"),
            stale_outcomes: counter(
                "stale_outcomes_total",
                "Outcomes discarded because their generation had ended",
            ),
            abandoned: counter(
                "abandoned_total",
                "Admitted calls dropped before reporting an outcome",
            ),
            transitions: counter("transitions_total", "Circuit state transitions"),
            counter_errors: counter("counter_errors_total", "Counter backend errors"),
            state: Gauge::new(
                format!("{prefix}_circuit_state"),
                "Circuit state (0 closed, 1 half-open, 2 open)",
            ),
        }
    }

    /// Record a state change.
    pub fn record_transition(&self, to: CircuitState) {
        self.transitions.inc();
        self.state.set(state_value(to));
    }

    /// Format all metrics as Prometheus text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        [
            self.admitted.to_prometheus(),
            self.rejected_open.to_prometheus(),
            self.rejected_too_many.to_prometheus(),
            self.successes.to_prometheus(),
            self.failures.to_prometheus(),
            self.stale_outcomes.to_prometheus(),
            self.abandoned.to_prometheus(),
            self.transitions.to_prometheus(),
            self.counter_errors.to_prometheus(),
            self.state.to_prometheus(),
        ]
        .concat()
    }
}

const fn state_value(state: CircuitState) -> u64 {
    match state {
        CircuitState::Closed => 0,
        CircuitState::HalfOpen => 1,
        CircuitState::Open => 2,
    }
}

fn metric_prefix(name: &str) -> String {
    let prefix: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if prefix.is_empty() {
        "breaker".to_string()
    } else {
        prefix
    }
}
