//! The circuit breaker state machine.
//!
//! All bookkeeping (state, generation, expiry, counts) sits behind one async
//! mutex that is held only while admitting a call or recording its outcome,
//! never while the guarded operation runs. Transitions are evaluated lazily
//! whenever the lock is taken; there is no background timer.
//!
//! ```text
//! Closed   --failure, ready_to_trip-->        Open
//! Open     --timeout elapsed-->               HalfOpen
//! HalfOpen --max_requests successes-->        Closed
//! HalfOpen --any failure-->                   Open
//! Closed   --interval elapsed-->              Closed (new generation)
//! ```

use crate::config::{BreakerConfig, CounterFailurePolicy};
use crate::counter::{Counter, Counts, MemoryCounter};
use crate::error::{BreakerError, CounterError};
use crate::metrics::BreakerMetrics;
use crate::state::{CircuitState, Ticket};
use std::fmt;
use std::mem;
use std::sync::{Mutex as SyncMutex, PoisonError};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Circuit breaker guarding calls to one dependency.
///
/// Share it between callers with an `Arc`.
pub struct CircuitBreaker<C = MemoryCounter> {
    config: BreakerConfig,
    metrics: BreakerMetrics,
    inner: Mutex<Inner<C>>,
    abandoned: SyncMutex<Vec<Ticket>>,
}

struct Inner<C> {
    state: CircuitState,
    generation: u64,
    expiry: Option<Instant>,
    counter: C,
}

impl CircuitBreaker<MemoryCounter> {
    /// Create a breaker backed by an in-memory counter.
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        let now = config.clock.now();
        let expiry = closed_expiry(&config, now);
        Self {
            metrics: BreakerMetrics::new(&config.name),
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                generation: 1,
                expiry,
                counter: MemoryCounter::new(),
            }),
            abandoned: SyncMutex::new(Vec::new()),
            config,
        }
    }

    /// Create a breaker with the default configuration.
    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(BreakerConfig::new(name))
    }
}

impl<C: Counter> CircuitBreaker<C> {
    /// Create a breaker backed by the given counter.
    ///
    /// The counter is cleared, since whatever it held belongs to no live
    /// generation of this breaker.
    pub async fn with_counter(config: BreakerConfig, counter: C) -> Self {
        let breaker = Self {
            metrics: BreakerMetrics::new(&config.name),
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                generation: 0,
                expiry: None,
                counter,
            }),
            abandoned: SyncMutex::new(Vec::new()),
            config,
        };

        {
            let mut inner = breaker.inner.lock().await;
            let now = breaker.config.clock.now();
            breaker.new_generation(&mut inner, now).await;
        }

        breaker
    }

    /// Breaker name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Breaker configuration.
    #[must_use]
    pub const fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Breaker metrics.
    #[must_use]
    pub const fn metrics(&self) -> &BreakerMetrics {
        &self.metrics
    }

    /// Current state, after applying any transition that is due.
    pub async fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock().await;
        let now = self.config.clock.now();
        self.resolve(&mut inner, now).await.0
    }

    /// Current generation, after applying any transition that is due.
    pub async fn generation(&self) -> u64 {
        let mut inner = self.inner.lock().await;
        let now = self.config.clock.now();
        self.resolve(&mut inner, now).await.1
    }

    /// Tallies for the current generation.
    ///
    /// An unreadable counter reads as zero.
    pub async fn counts(&self) -> Counts {
        let mut inner = self.inner.lock().await;
        let now = self.config.clock.now();
        self.resolve(&mut inner, now).await;
        match inner.counter.snapshot().await {
            Ok(counts) => counts,
            Err(err) => {
                self.counter_error("snapshot", &err);
                Counts::default()
            }
        }
    }

    /// Decide whether a call may proceed.
    ///
    /// On success the returned [`Ticket`] must be passed to
    /// [`after_call`](Self::after_call) once the call has completed.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::Open`] while the circuit is open,
    /// [`BreakerError::TooManyRequests`] when the half-open probe budget is
    /// used up, and [`BreakerError::CounterUnavailable`] when the counter
    /// fails under [`CounterFailurePolicy::FailClosed`].
    #[instrument(level = "debug", skip(self), fields(breaker = %self.config.name))]
    pub async fn before_call(&self) -> Result<Ticket, BreakerError> {
        let mut inner = self.inner.lock().await;
        let now = self.config.clock.now();
        let (state, generation) = self.resolve(&mut inner, now).await;

        match state {
            CircuitState::Open => {
                self.metrics.rejected_open.inc();
                return Err(BreakerError::open(&self.config.name));
            }
            CircuitState::HalfOpen => {
                let requests = match inner.counter.requests().await {
                    Ok(requests) => requests,
                    Err(err) => self.degrade("requests", err)?,
                };
                if requests >= self.config.max_requests {
                    self.metrics.rejected_too_many.inc();
                    return Err(BreakerError::too_many_requests(&self.config.name));
                }
            }
            CircuitState::Closed => {}
        }

        if let Err(err) = inner.counter.on_request().await {
            self.degrade::<()>("on_request", err)?;
        }

        self.metrics.admitted.inc();
        Ok(Ticket::new(generation))
    }

    /// Record the classified outcome of a call admitted with `ticket`.
    ///
    /// Outcomes from a generation that has since ended are discarded.
    #[instrument(level = "debug", skip(self), fields(breaker = %self.config.name))]
    pub async fn after_call(&self, ticket: Ticket, success: bool) {
        let mut inner = self.inner.lock().await;
        let now = self.config.clock.now();
        let (state, generation) = self.resolve(&mut inner, now).await;

        if generation != ticket.generation() {
            self.metrics.stale_outcomes.inc();
            debug!(
                ticket = ticket.generation(),
                generation, "discarding outcome from ended generation"
            );
            return;
        }

        if success {
            self.on_success(&mut inner, state, now).await;
        } else {
            self.on_failure(&mut inner, state, now).await;
        }
    }

    async fn on_success(&self, inner: &mut Inner<C>, state: CircuitState, now: Instant) {
        match state {
            CircuitState::Closed => {
                self.metrics.successes.inc();
                if let Err(err) = inner.counter.on_success().await {
                    self.counter_error("on_success", &err);
                }
            }
            CircuitState::HalfOpen => {
                self.metrics.successes.inc();
                if let Err(err) = inner.counter.on_success().await {
                    self.counter_error("on_success", &err);
                }
                let run = inner.counter.consecutive_successes().await.unwrap_or_else(|err| {
                    self.counter_error("consecutive_successes", &err);
                    0
                });
                if run >= self.config.max_requests {
                    self.set_state(inner, CircuitState::Closed, now).await;
                }
            }
            CircuitState::Open => {}
        }
    }

    async fn on_failure(&self, inner: &mut Inner<C>, state: CircuitState, now: Instant) {
        match state {
            CircuitState::Closed => {
                self.metrics.failures.inc();
                if let Err(err) = inner.counter.on_failure().await {
                    self.counter_error("on_failure", &err);
                }
                let counts = inner.counter.snapshot().await.unwrap_or_else(|err| {
                    self.counter_error("snapshot", &err);
                    Counts::default()
                });
                if self.config.ready_to_trip.ready_to_trip(&counts) {
                    self.set_state(inner, CircuitState::Open, now).await;
                }
            }
            CircuitState::HalfOpen => {
                self.metrics.failures.inc();
                self.set_state(inner, CircuitState::Open, now).await;
            }
            CircuitState::Open => {}
        }
    }

    /// Give up on a call admitted with `ticket` without awaiting.
    ///
    /// The call is recorded as a failure the next time the breaker is
    /// consulted. Use this from `Drop` impls and other places that cannot
    /// reach [`after_call`](Self::after_call).
    pub fn abandon(&self, ticket: Ticket) {
        self.abandoned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ticket);
    }

    /// Apply any transition that is due at `now`, settle abandoned calls and
    /// report the live state and generation.
    async fn resolve(&self, inner: &mut Inner<C>, now: Instant) -> (CircuitState, u64) {
        self.expire(inner, now).await;

        let abandoned = {
            let mut queue = self.abandoned.lock().unwrap_or_else(PoisonError::into_inner);
            mem::take(&mut *queue)
        };
        for ticket in abandoned {
            self.metrics.abandoned.inc();
            if ticket.generation() != inner.generation {
                self.metrics.stale_outcomes.inc();
                continue;
            }
            warn!(
                breaker = %self.config.name,
                generation = inner.generation,
                "call dropped before completion, recording failure"
            );
            let state = inner.state;
            self.on_failure(inner, state, now).await;
        }

        (inner.state, inner.generation)
    }

    async fn expire(&self, inner: &mut Inner<C>, now: Instant) {
        let due = inner.expiry.is_some_and(|expiry| expiry <= now);
        match inner.state {
            CircuitState::Closed if due => {
                self.new_generation(inner, now).await;
                debug!(
                    breaker = %self.config.name,
                    generation = inner.generation,
                    "counting interval elapsed"
                );
            }
            CircuitState::Open if due => {
                self.set_state(inner, CircuitState::HalfOpen, now).await;
            }
            _ => {}
        }
    }

    async fn set_state(&self, inner: &mut Inner<C>, to: CircuitState, now: Instant) {
        if inner.state == to {
            return;
        }

        let from = inner.state;
        inner.state = to;
        self.new_generation(inner, now).await;
        self.metrics.record_transition(to);

        info!(
            breaker = %self.config.name,
            %from,
            %to,
            generation = inner.generation,
            "circuit state changed"
        );

        if let Some(listener) = &self.config.on_state_change {
            listener.on_state_change(&self.config.name, from, to);
        }
    }

    async fn new_generation(&self, inner: &mut Inner<C>, now: Instant) {
        inner.generation = inner.generation.wrapping_add(1);
        if let Err(err) = inner.counter.clear().await {
            self.counter_error("clear", &err);
        }

        inner.expiry = match inner.state {
            CircuitState::Closed => closed_expiry(&self.config, now),
            CircuitState::Open => now.checked_add(self.config.timeout),
            CircuitState::HalfOpen => None,
        };
    }

    fn degrade<T: Default>(&self, op: &'static str, err: CounterError) -> Result<T, BreakerError> {
        self.counter_error(op, &err);
        match self.config.counter_failure_policy {
            CounterFailurePolicy::FailOpen => Ok(T::default()),
            CounterFailurePolicy::FailClosed => Err(BreakerError::CounterUnavailable {
                name: self.config.name.clone(),
                source: err,
            }),
        }
    }

    fn counter_error(&self, op: &'static str, err: &CounterError) {
        self.metrics.counter_errors.inc();
        warn!(breaker = %self.config.name, op, error = %err, "counter backend failed");
    }
}

fn closed_expiry(config: &BreakerConfig, now: Instant) -> Option<Instant> {
    if config.interval.is_zero() {
        None
    } else {
        now.checked_add(config.interval)
    }
}

impl<C> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
