//! Breaker states and admission tickets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Calls are admitted and outcomes are counted
    #[default]
    Closed,
    /// A limited number of probe calls are admitted to test recovery
    HalfOpen,
    /// Every call is rejected until the open timeout elapses
    Open,
}

impl CircuitState {
    /// Stable lowercase label, used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::HalfOpen => "half-open",
            Self::Open => "open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proof of admission returned by
/// [`CircuitBreaker::before_call`](crate::CircuitBreaker::before_call).
///
/// Carries the generation that was live when the call was admitted. Outcomes
/// reported with a ticket from a superseded generation are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a ticket must be handed back to `after_call`"]
pub struct Ticket {
    generation: u64,
}

impl Ticket {
    pub(crate) const fn new(generation: u64) -> Self {
        Self { generation }
    }

    /// Generation observed at admission.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}
