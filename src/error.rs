//! Error types for retry execution and strategy configuration.

use crate::attempt::{Attempt, AttemptError};
use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Terminal failure of a retry loop.
#[derive(Debug)]
pub enum RetryError<V, E> {
    /// The stop strategy ended the loop, or it was cancelled, before any
    /// attempt was accepted. Carries the final attempt for inspection.
    Exhausted {
        /// Total attempts executed.
        attempts: u64,
        /// The last attempt, rejected like all the ones before it.
        last: Attempt<V, E>,
    },
    /// An attempt failed in a way the retry predicate does not cover; the
    /// cause surfaces immediately instead of being retried.
    Inner(AttemptError<E>),
}

impl<V, E> RetryError<V, E> {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// Attempt count, for exhaustion errors.
    pub fn attempts(&self) -> Option<u64> {
        match self {
            RetryError::Exhausted { attempts, .. } => Some(*attempts),
            RetryError::Inner(_) => None,
        }
    }

    /// The final rejected attempt, for exhaustion errors.
    pub fn last_attempt(&self) -> Option<&Attempt<V, E>> {
        match self {
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::Inner(_) => None,
        }
    }

    /// The underlying attempt error, wherever one exists: the direct cause
    /// for non-retried failures, or the last attempt's error for exhaustion.
    pub fn last_error(&self) -> Option<&AttemptError<E>> {
        match self {
            RetryError::Exhausted { last, .. } => last.error(),
            RetryError::Inner(cause) => Some(cause),
        }
    }

    /// Unwrap back to the operation's own error type, when the failure was an
    /// operation error rather than a timeout or a rejected result.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Exhausted { last, .. } => match last.into_outcome() {
                Err(cause) => cause.into_inner(),
                Ok(_) => None,
            },
            RetryError::Inner(cause) => cause.into_inner(),
        }
    }
}

impl<V, E: fmt::Display> fmt::Display for RetryError<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted { attempts, last } => {
                write!(f, "retries exhausted after {attempts} attempts")?;
                match last.error() {
                    Some(cause) => write!(f, "; last error: {cause}"),
                    None => write!(f, "; last result rejected"),
                }
            }
            RetryError::Inner(cause) => cause.fmt(f),
        }
    }
}

impl<V, E> Error for RetryError<V, E>
where
    V: fmt::Debug,
    E: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RetryError::Exhausted { last, .. } => {
                last.error().map(|cause| cause as &(dyn Error + 'static))
            }
            RetryError::Inner(cause) => Some(cause),
        }
    }
}

/// Invalid strategy configuration, reported at construction time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("stop_after_attempts requires at least one attempt")]
    ZeroAttempts,
    #[error("random wait range [{min:?}, {max:?}) is empty")]
    EmptyRandomRange { min: Duration, max: Duration },
    #[error("this wait strategy does not take a maximum")]
    MaxNotSupported,
    #[error("maximum wait must be greater than zero")]
    ZeroMax,
    #[error("jitter multiplier must be finite and positive, got {0}")]
    BadJitterMultiplier(f64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn exhausted_with_error() -> RetryError<u32, io::Error> {
        let cause = AttemptError::Inner(io::Error::new(io::ErrorKind::TimedOut, "flaky"));
        let last = Attempt::new(3, Duration::from_millis(90), Err(cause));
        RetryError::Exhausted { attempts: 3, last }
    }

    fn exhausted_with_result() -> RetryError<u32, io::Error> {
        let last = Attempt::new(5, Duration::from_millis(9), Ok(0));
        RetryError::Exhausted { attempts: 5, last }
    }

    #[test]
    fn exhaustion_reports_attempt_count_and_last_attempt() {
        let err = exhausted_with_error();
        assert!(err.is_exhausted());
        assert_eq!(err.attempts(), Some(3));
        assert_eq!(err.last_attempt().map(Attempt::number), Some(3));
        assert!(err.last_error().is_some());
    }

    #[test]
    fn display_distinguishes_error_and_result_causes() {
        assert_eq!(
            exhausted_with_error().to_string(),
            "retries exhausted after 3 attempts; last error: flaky"
        );
        assert_eq!(
            exhausted_with_result().to_string(),
            "retries exhausted after 5 attempts; last result rejected"
        );
    }

    #[test]
    fn non_retried_failures_pass_the_cause_through() {
        let err: RetryError<u32, io::Error> =
            RetryError::Inner(AttemptError::Inner(io::Error::new(io::ErrorKind::Other, "hard")));
        assert!(!err.is_exhausted());
        assert_eq!(err.attempts(), None);
        let inner = err.into_inner().unwrap();
        assert_eq!(inner.to_string(), "hard");
    }

    #[test]
    fn source_chains_to_the_attempt_error() {
        let err = exhausted_with_error();
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "flaky");
    }

    #[test]
    fn timeouts_do_not_unwrap_to_an_inner_error() {
        let err: RetryError<u32, io::Error> = RetryError::Inner(AttemptError::Timeout {
            limit: Duration::from_millis(10),
            elapsed: Duration::from_millis(12),
        });
        assert!(err.into_inner().is_none());
    }
}
