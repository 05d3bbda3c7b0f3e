//! Convenient re-exports for common Reattempt types.
pub use crate::{
    attempt::{Attempt, AttemptError},
    block::{BlockStrategy, InstantBlock, ThreadBlock, TrackingBlock},
    cancel::{CancelToken, Cancelled},
    error::{ConfigError, RetryError},
    limit::TimeLimit,
    listener::{FailedAttemptEvent, FailedAttemptHandler, FailureCause, RetryListener},
    retryer::{Retryer, RetryerBuilder, RetryingCall},
    stop::Stop,
    wait::{Wait, MAX_WAIT},
};
