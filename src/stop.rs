//! Stop strategies: decide when the retry loop gives up.
//!
//! A stop strategy is consulted after every rejected attempt with the attempt
//! number and the time elapsed since the call began. All strategies are pure:
//! identical inputs yield identical answers.

use crate::error::ConfigError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

type StopFn = dyn Fn(u64, Duration) -> bool + Send + Sync;

/// Stop strategy deciding whether the loop gives up after a rejected attempt.
#[derive(Clone)]
pub struct Stop {
    kind: StopKind,
}

#[derive(Clone)]
enum StopKind {
    Never,
    AfterAttempts(u64),
    AfterDelay(Duration),
    Custom(Arc<StopFn>),
}

impl Stop {
    /// Never stop retrying. Best combined with a wait strategy that keeps the
    /// load on the failing dependency reasonable.
    pub fn never() -> Self {
        Self { kind: StopKind::Never }
    }

    /// Stop once `attempt_number >= max_attempts`. Requires `max_attempts >= 1`.
    pub fn after_attempts(max_attempts: u64) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(Self { kind: StopKind::AfterAttempts(max_attempts) })
    }

    /// Stop once the time elapsed since the first attempt reaches `max_delay`.
    /// The boundary is inclusive: an elapsed time equal to `max_delay` stops.
    pub fn after_delay(max_delay: Duration) -> Self {
        Self { kind: StopKind::AfterDelay(max_delay) }
    }

    /// Custom stop predicate over `(attempt_number, elapsed)`.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(u64, Duration) -> bool + Send + Sync + 'static,
    {
        Self { kind: StopKind::Custom(Arc::new(f)) }
    }

    /// Should the loop give up after the given rejected attempt?
    pub fn should_stop(&self, attempt_number: u64, elapsed: Duration) -> bool {
        match &self.kind {
            StopKind::Never => false,
            StopKind::AfterAttempts(max) => attempt_number >= *max,
            StopKind::AfterDelay(max) => elapsed >= *max,
            StopKind::Custom(f) => f(attempt_number, elapsed),
        }
    }
}

impl fmt::Debug for Stop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StopKind::Never => write!(f, "Stop::Never"),
            StopKind::AfterAttempts(max) => write!(f, "Stop::AfterAttempts({})", max),
            StopKind::AfterDelay(max) => write!(f, "Stop::AfterDelay({:?})", max),
            StopKind::Custom(_) => write!(f, "Stop::Custom(<predicate>)"),
        }
    }
}
