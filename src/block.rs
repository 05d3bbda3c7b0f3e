//! Block strategies: how the retry loop spends the computed delay.

use crate::cancel::{CancelToken, Cancelled};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How to pause between attempts. The default implementation parks the
/// current thread; alternatives exist mainly for tests and simulations.
pub trait BlockStrategy: Send + Sync + fmt::Debug {
    /// Pause for `duration`, waking early if `cancel` fires.
    fn block(&self, duration: Duration, cancel: &CancelToken) -> Result<(), Cancelled>;
}

/// Parks the calling thread for the full duration, interruptible by
/// cancellation.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadBlock;

impl BlockStrategy for ThreadBlock {
    fn block(&self, duration: Duration, cancel: &CancelToken) -> Result<(), Cancelled> {
        if cancel.wait_for(duration) {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Never sleeps. Cancellation is still honored so cancelled loops stop at the
/// next wait boundary even under instant blocking.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstantBlock;

impl BlockStrategy for InstantBlock {
    fn block(&self, _duration: Duration, cancel: &CancelToken) -> Result<(), Cancelled> {
        if cancel.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Records every requested delay without sleeping. Test double for asserting
/// on the delays a retry loop would have waited.
#[derive(Debug, Default, Clone)]
pub struct TrackingBlock {
    calls: Arc<Mutex<Vec<Duration>>>,
}

impl TrackingBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blocks requested so far.
    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Duration of the `idx`-th block, if it happened.
    pub fn call_at(&self, idx: usize) -> Option<Duration> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).get(idx).copied()
    }

    /// Snapshot of all recorded durations, in order.
    pub fn all_calls(&self) -> Vec<Duration> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl BlockStrategy for TrackingBlock {
    fn block(&self, duration: Duration, cancel: &CancelToken) -> Result<(), Cancelled> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(duration);
        if cancel.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}
