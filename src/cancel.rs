//! Cooperative cancellation for in-flight retry loops.
//!
//! A [`CancelToken`] is a cheap, cloneable handle shared between a thread
//! running a retry loop and any thread that may want to abort it. Cancellation
//! is observed at wait boundaries: a sleeping loop wakes immediately, while an
//! attempt already executing runs to completion first.

use std::error::Error;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Marker error reported when a blocked wait is interrupted by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "retry loop cancelled")
    }
}

impl Error for Cancelled {}

/// Cloneable cancellation handle. All clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    flag: Mutex<bool>,
    cvar: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake every thread parked in [`CancelToken::wait_for`].
    /// Idempotent.
    pub fn cancel(&self) {
        let mut flag = self.inner.flag.lock().unwrap_or_else(|e| e.into_inner());
        *flag = true;
        self.inner.cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.flag.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sleep for `duration` unless cancelled first. Returns `true` when the
    /// wait was interrupted by cancellation, `false` when the full duration
    /// elapsed. Returns immediately if already cancelled.
    pub fn wait_for(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        let mut flag = self.inner.flag.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if *flag {
                return true;
            }
            // A deadline past the representable range degrades to waiting in
            // day-long chunks, still interruptible by cancel().
            let remaining = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(remaining) if !remaining.is_zero() => remaining,
                    _ => return false,
                },
                None => Duration::from_secs(86_400),
            };
            let (guard, _timed_out) = self
                .inner
                .cvar
                .wait_timeout(flag, remaining)
                .unwrap_or_else(|e| e.into_inner());
            flag = guard;
        }
    }
}
