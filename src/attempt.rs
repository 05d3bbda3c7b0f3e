//! The attempt model: the immutable record of one invocation of the wrapped
//! operation.
//!
//! Every loop iteration of a [`Retryer`](crate::Retryer) produces exactly one
//! `Attempt`: either the value the operation returned or the cause of its
//! failure, tagged with the 1-based attempt number and the time elapsed since
//! the first attempt of the call. Retry decisions (rejection predicate, stop
//! strategy, wait strategy) are made by inspecting this data instead of by
//! exception-style control flow.
//!
//! Attempt numbers increase by exactly 1 per iteration within one call,
//! starting at 1; elapsed time is non-decreasing across the attempts of a
//! call.

use std::fmt;
use std::time::Duration;

/// Failure cause of a single attempt.
///
/// A timeout raised by the attempt time limiter is kept distinct from the
/// operation's own error so predicates can treat the two differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError<E> {
    /// The operation's own error, unchanged.
    Inner(E),
    /// The attempt time limiter gave up before the operation completed.
    Timeout {
        /// Configured per-attempt deadline.
        limit: Duration,
        /// How long the limiter actually waited.
        elapsed: Duration,
    },
}

impl<E> AttemptError<E> {
    /// Borrow the operation's error if this is an `Inner` cause.
    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Timeout { .. } => None,
        }
    }

    /// Extract the operation's error if this is an `Inner` cause.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Timeout { .. } => None,
        }
    }

    /// Check if this cause is a time-limiter timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl<E: fmt::Display> fmt::Display for AttemptError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inner(e) => write!(f, "{}", e),
            Self::Timeout { limit, elapsed } => {
                write!(f, "attempt timed out after {:?} (limit: {:?})", elapsed, limit)
            }
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for AttemptError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Timeout { .. } => None,
        }
    }
}

/// Immutable outcome of one invocation of the wrapped operation.
///
/// Exactly one of a produced value or a failure cause is present; the
/// accessors make reading the wrong side unrepresentable rather than a
/// runtime surprise.
#[derive(Debug, Clone)]
pub struct Attempt<V, E> {
    number: u64,
    elapsed: Duration,
    outcome: Result<V, AttemptError<E>>,
}

impl<V, E> Attempt<V, E> {
    pub(crate) fn new(number: u64, elapsed: Duration, outcome: Result<V, AttemptError<E>>) -> Self {
        debug_assert!(number >= 1, "attempt numbers are 1-based");
        Self { number, elapsed, outcome }
    }

    /// The 1-based attempt number within this call.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Time elapsed since the first attempt of this call began.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Whether the operation produced a value.
    pub fn has_result(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Whether the operation failed (including time-limiter timeouts).
    pub fn has_error(&self) -> bool {
        self.outcome.is_err()
    }

    /// Borrow the produced value, if any.
    pub fn result(&self) -> Option<&V> {
        self.outcome.as_ref().ok()
    }

    /// Borrow the failure cause, if any.
    pub fn error(&self) -> Option<&AttemptError<E>> {
        self.outcome.as_ref().err()
    }

    /// Borrow the outcome as a whole.
    pub fn outcome(&self) -> Result<&V, &AttemptError<E>> {
        self.outcome.as_ref()
    }

    /// Consume the attempt, yielding the outcome.
    pub fn into_outcome(self) -> Result<V, AttemptError<E>> {
        self.outcome
    }
}
