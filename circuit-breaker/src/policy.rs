//! Pluggable decision strategies.
//!
//! Each strategy is a small trait with a blanket impl for matching closures,
//! so callers can pass either a named policy type or a plain `Fn`.

use crate::counter::Counts;
use crate::state::CircuitState;
use std::error::Error;

/// Decides whether the closed breaker should trip after a failure.
pub trait TripPolicy: Send + Sync {
    /// Return `true` to open the circuit.
    fn ready_to_trip(&self, counts: &Counts) -> bool;
}

impl<F> TripPolicy for F
where
    F: Fn(&Counts) -> bool + Send + Sync,
{
    fn ready_to_trip(&self, counts: &Counts) -> bool {
        self(counts)
    }
}

/// Trips once the consecutive failure run exceeds a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsecutiveFailures(pub u32);

impl Default for ConsecutiveFailures {
    fn default() -> Self {
        Self(5)
    }
}

impl TripPolicy for ConsecutiveFailures {
    fn ready_to_trip(&self, counts: &Counts) -> bool {
        counts.consecutive_failures > self.0
    }
}

/// Trips once the failure ratio reaches `ratio` over at least `min_requests`
/// admitted calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FailureRatio {
    /// Minimum admitted requests before the ratio is considered
    pub min_requests: u32,
    /// Failure ratio in `0.0..=1.0` at which the breaker trips
    pub ratio: f64,
}

impl TripPolicy for FailureRatio {
    fn ready_to_trip(&self, counts: &Counts) -> bool {
        if counts.requests < self.min_requests || counts.requests == 0 {
            return false;
        }
        f64::from(counts.total_failures) / f64::from(counts.requests) >= self.ratio
    }
}

/// Classifies an operation outcome for counting purposes.
///
/// `error` is `None` when the operation returned `Ok`.
pub trait SuccessPolicy: Send + Sync {
    /// Return `true` to count the outcome as a success.
    fn is_successful(&self, error: Option<&(dyn Error + 'static)>) -> bool;
}

impl<F> SuccessPolicy for F
where
    F: Fn(Option<&(dyn Error + 'static)>) -> bool + Send + Sync,
{
    fn is_successful(&self, error: Option<&(dyn Error + 'static)>) -> bool {
        self(error)
    }
}

/// Counts every `Ok` as a success and every `Err` as a failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoError;

impl SuccessPolicy for NoError {
    fn is_successful(&self, error: Option<&(dyn Error + 'static)>) -> bool {
        error.is_none()
    }
}

/// Notified whenever the breaker changes state.
pub trait StateListener: Send + Sync {
    /// Called with the breaker name and the previous and new states.
    fn on_state_change(&self, name: &str, from: CircuitState, to: CircuitState);
}

impl<F> StateListener for F
where
    F: Fn(&str, CircuitState, CircuitState) + Send + Sync,
{
    fn on_state_change(&self, name: &str, from: CircuitState, to: CircuitState) {
        self(name, from, to);
    }
}
