//! Running an operation through the breaker.

use crate::breaker::CircuitBreaker;
use crate::counter::Counter;
use crate::error::CallError;
use crate::state::Ticket;
use futures::FutureExt;
use std::error::Error;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use tracing::warn;

impl<C: Counter> CircuitBreaker<C> {
    /// Run `operation` if the breaker admits it and record its outcome.
    ///
    /// The outcome is classified by the configured
    /// [`SuccessPolicy`](crate::SuccessPolicy). The operation's own result is
    /// returned unchanged; its error arrives as [`CallError::Operation`].
    /// If the operation panics, a failure is recorded and the panic resumes.
    ///
    /// # Errors
    ///
    /// [`CallError::Rejected`] if the breaker refused the call, otherwise
    /// whatever the operation returned.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        self.call_with(operation, |result| self.classify(result)).await
    }

    /// Like [`call`](Self::call), but with a per-call classifier that sees
    /// the whole result, e.g. to count an `Ok` HTTP 503 as a failure.
    ///
    /// Dropping the returned future before it completes (a timeout, a lost
    /// `select!` branch) records the call as a failure.
    ///
    /// # Errors
    ///
    /// [`CallError::Rejected`] if the breaker refused the call, otherwise
    /// whatever the operation returned.
    pub async fn call_with<F, Fut, T, E, K>(
        &self,
        operation: F,
        classify: K,
    ) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        K: FnOnce(&Result<T, E>) -> bool,
    {
        let ticket = self.before_call().await?;
        let mut guard = TicketGuard {
            breaker: self,
            ticket: Some(ticket),
        };

        let outcome = AssertUnwindSafe(async move { operation().await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(result) => {
                let success = classify(&result);
                self.after_call(ticket, success).await;
                guard.disarm();
                result.map_err(CallError::Operation)
            }
            Err(payload) => {
                warn!(breaker = %self.name(), "guarded operation panicked");
                self.after_call(ticket, false).await;
                guard.disarm();
                panic::resume_unwind(payload)
            }
        }
    }

    /// Classify a result with the configured
    /// [`SuccessPolicy`](crate::SuccessPolicy).
    pub fn classify<T, E>(&self, result: &Result<T, E>) -> bool
    where
        E: Error + 'static,
    {
        let policy = &self.config().is_successful;
        match result {
            Ok(_) => policy.is_successful(None),
            Err(err) => policy.is_successful(Some(err as &(dyn Error + 'static))),
        }
    }
}

/// Abandons the ticket unless disarmed, so a cancelled call still counts.
struct TicketGuard<'a, C: Counter> {
    breaker: &'a CircuitBreaker<C>,
    ticket: Option<Ticket>,
}

impl<C: Counter> TicketGuard<'_, C> {
    const fn disarm(&mut self) {
        self.ticket = None;
    }
}

impl<C: Counter> Drop for TicketGuard<'_, C> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.breaker.abandon(ticket);
        }
    }
}
