#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Reattempt
//!
//! A retry execution engine for fallible synchronous operations: run a
//! closure until a result is accepted, with pluggable stop, wait, block, and
//! time-limit strategies.
//!
//! ## Features
//!
//! - **Retry predicates** over results, errors, timeouts, or whole attempts
//! - **Stop strategies** (never, after N attempts, after a total delay)
//! - **Wait strategies** (fixed, incrementing, random, exponential,
//!   fibonacci, full jitter, error-derived, composed)
//! - **Per-attempt time limits** via an abandonable worker thread
//! - **Cooperative cancellation** from other threads
//! - **Listeners and failed-attempt handlers** for observation
//!
//! ## Quick Start
//!
//! ```rust
//! use reattempt::{Retryer, Stop, Wait};
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! struct Flaky;
//! impl std::fmt::Display for Flaky { fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "flaky") } }
//! impl std::error::Error for Flaky {}
//!
//! let retryer = Retryer::<u32, Flaky>::builder()
//!     .retry_if_any_error()
//!     .stop(Stop::after_attempts(5).unwrap())
//!     .wait(Wait::exponential().with_max(Duration::from_secs(1)).unwrap())
//!     .build();
//!
//! let mut calls = 0;
//! let value = retryer.call(move || {
//!     calls += 1;
//!     if calls < 3 { Err(Flaky) } else { Ok(calls) }
//! });
//! assert_eq!(value.unwrap(), 3);
//! ```

pub mod attempt;
pub mod block;
pub mod cancel;
pub mod error;
pub mod limit;
pub mod listener;
pub mod prelude;
pub mod retryer;
pub mod stop;
pub mod wait;

// Re-exports
pub use attempt::{Attempt, AttemptError};
pub use block::{BlockStrategy, InstantBlock, ThreadBlock, TrackingBlock};
pub use cancel::{CancelToken, Cancelled};
pub use error::{ConfigError, RetryError};
pub use limit::TimeLimit;
pub use listener::{FailedAttemptEvent, FailedAttemptHandler, FailureCause, RetryListener};
pub use retryer::{Retryer, RetryerBuilder, RetryingCall};
pub use stop::Stop;
pub use wait::{Wait, MAX_WAIT};
