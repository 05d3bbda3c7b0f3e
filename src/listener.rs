//! Observation hooks: per-attempt listeners and failed-attempt handlers.

use crate::attempt::{Attempt, AttemptError};
use std::time::Duration;

/// Observer invoked after every attempt, successful or not, before the retry
/// decision is made. Listeners must not panic; they have no way to influence
/// the loop.
pub trait RetryListener<V, E>: Send + Sync {
    fn on_attempt(&self, attempt: &Attempt<V, E>);
}

impl<V, E, F> RetryListener<V, E> for F
where
    F: Fn(&Attempt<V, E>) + Send + Sync,
{
    fn on_attempt(&self, attempt: &Attempt<V, E>) {
        self(attempt)
    }
}

/// Hook invoked for a rejected attempt once the loop has decided to continue,
/// after the next delay is computed and before the block.
pub trait FailedAttemptHandler<V, E>: Send + Sync {
    fn on_failed_attempt(&self, event: &FailedAttemptEvent<'_, V, E>);
}

impl<V, E, F> FailedAttemptHandler<V, E> for F
where
    F: Fn(&FailedAttemptEvent<'_, V, E>) + Send + Sync,
{
    fn on_failed_attempt(&self, event: &FailedAttemptEvent<'_, V, E>) {
        self(event)
    }
}

/// Snapshot handed to [`FailedAttemptHandler`]s: why the attempt was rejected
/// and how long the loop will wait before the next one.
#[derive(Debug)]
pub struct FailedAttemptEvent<'a, V, E> {
    next_wait: Duration,
    cause: FailureCause<'a, V, E>,
}

/// What made the rejecting predicate fire.
#[derive(Debug)]
pub enum FailureCause<'a, V, E> {
    /// The attempt produced a value the predicate rejected.
    Result(&'a V),
    /// The attempt failed with an error or timed out.
    Error(&'a AttemptError<E>),
}

impl<'a, V, E> FailedAttemptEvent<'a, V, E> {
    pub(crate) fn new(next_wait: Duration, attempt: &'a Attempt<V, E>) -> Self {
        let cause = match attempt.outcome() {
            Ok(value) => FailureCause::Result(value),
            Err(error) => FailureCause::Error(error),
        };
        Self { next_wait, cause }
    }

    /// Delay the loop will block for before the next attempt.
    pub fn next_wait(&self) -> Duration {
        self.next_wait
    }

    pub fn cause(&self) -> &FailureCause<'a, V, E> {
        &self.cause
    }

    pub fn result(&self) -> Option<&V> {
        match self.cause {
            FailureCause::Result(value) => Some(value),
            FailureCause::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&AttemptError<E>> {
        match self.cause {
            FailureCause::Result(_) => None,
            FailureCause::Error(error) => Some(error),
        }
    }

    pub fn is_result(&self) -> bool {
        matches!(self.cause, FailureCause::Result(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.cause, FailureCause::Error(_))
    }
}
