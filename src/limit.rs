//! Per-attempt time limits.
//!
//! A bounded limit runs each attempt on a worker thread and waits up to the
//! configured budget for its result. When the budget elapses the attempt is
//! reported as timed out and the worker is abandoned; the operation is held
//! in an `Arc<Mutex<_>>` so a later attempt blocks until the straggler
//! releases it rather than racing it on `&mut` state. The budget only starts
//! once the worker holds the operation, so time spent queued behind a
//! straggler is never charged to the attempt and a timed-out operation stays
//! retryable.

use crate::attempt::AttemptError;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Time budget applied to each individual attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeLimit {
    kind: LimitKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum LimitKind {
    #[default]
    None,
    Fixed(Duration),
}

impl TimeLimit {
    /// No limit: the attempt runs inline on the calling thread.
    pub fn none() -> Self {
        Self { kind: LimitKind::None }
    }

    /// Bound each attempt to `limit`, running it on a worker thread.
    pub fn fixed(limit: Duration) -> Self {
        Self { kind: LimitKind::Fixed(limit) }
    }

    pub fn is_bounded(&self) -> bool {
        matches!(self.kind, LimitKind::Fixed(_))
    }

    pub(crate) fn execute<V, E, F>(
        &self,
        op: &mut OpSlot<F>,
    ) -> Result<V, AttemptError<E>>
    where
        F: FnMut() -> Result<V, E> + Send + 'static,
        V: Send + 'static,
        E: Send + 'static,
    {
        match (self.kind, &mut *op) {
            (LimitKind::Fixed(limit), OpSlot::Shared(shared)) => {
                run_bounded(Arc::clone(shared), limit)
            }
            (_, slot) => slot.invoke().map_err(AttemptError::Inner),
        }
    }
}

/// Holder for the operation closure. Bounded execution needs the closure
/// behind `Arc<Mutex<_>>` so abandoned workers keep a valid reference;
/// unbounded execution keeps it inline with no locking.
pub(crate) enum OpSlot<F> {
    Direct(F),
    Shared(Arc<Mutex<F>>),
}

impl<F> OpSlot<F> {
    pub(crate) fn new(op: F, limit: &TimeLimit) -> Self {
        if limit.is_bounded() {
            OpSlot::Shared(Arc::new(Mutex::new(op)))
        } else {
            OpSlot::Direct(op)
        }
    }
}

impl<F> OpSlot<F> {
    fn invoke<V, E>(&mut self) -> Result<V, E>
    where
        F: FnMut() -> Result<V, E>,
    {
        match self {
            OpSlot::Direct(op) => op(),
            OpSlot::Shared(shared) => {
                let mut guard = shared.lock().unwrap_or_else(|e| e.into_inner());
                (*guard)()
            }
        }
    }
}

fn run_bounded<V, E, F>(op: Arc<Mutex<F>>, limit: Duration) -> Result<V, AttemptError<E>>
where
    F: FnMut() -> Result<V, E> + Send + 'static,
    V: Send + 'static,
    E: Send + 'static,
{
    let (started_tx, started_rx) = mpsc::sync_channel(1);
    let (tx, rx) = mpsc::sync_channel(1);
    thread::spawn(move || {
        // If an earlier worker poisoned the lock by panicking, keep going
        // with the closure as it stands.
        let mut guard = op.lock().unwrap_or_else(|e| e.into_inner());
        let _ = started_tx.send(Instant::now());
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (*guard)()));
        drop(guard);
        let _ = tx.send(outcome);
    });
    // The budget starts once the worker holds the operation, not while it
    // queues behind an abandoned straggler's lock.
    let started = started_rx.recv().unwrap_or_else(|_| Instant::now());
    match rx.recv_timeout(limit) {
        Ok(Ok(result)) => result.map_err(AttemptError::Inner),
        Ok(Err(payload)) => panic::resume_unwind(payload),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            Err(AttemptError::Timeout { limit, elapsed: started.elapsed() })
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            panic!("attempt worker exited without reporting an outcome")
        }
    }
}
