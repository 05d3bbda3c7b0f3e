//! Retry execution engine.
//!
//! A [`Retryer`] runs a fallible operation until an attempt is accepted,
//! combining the configured strategies:
//! - the rejecting predicate decides whether an attempt is retried,
//! - [`Stop`] decides when to give up,
//! - [`Wait`] computes the delay before the next attempt,
//! - [`BlockStrategy`] spends that delay,
//! - [`TimeLimit`] bounds each individual attempt.
//!
//! Per-iteration order: execute, build the [`Attempt`], notify listeners,
//! check acceptance, check stop, compute the delay, notify failed-attempt
//! handlers, block. Handlers therefore only fire for attempts the loop will
//! actually follow with another attempt.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use reattempt::{Retryer, Stop, Wait};
//!
//! #[derive(Debug)]
//! struct Flaky;
//! impl std::fmt::Display for Flaky { fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "flaky") } }
//! impl std::error::Error for Flaky {}
//!
//! let retryer = Retryer::<u32, Flaky>::builder()
//!     .retry_if_any_error()
//!     .stop(Stop::after_attempts(3).unwrap())
//!     .wait(Wait::fixed(Duration::from_millis(1)))
//!     .build();
//! let mut calls = 0;
//! let value = retryer
//!     .call(move || {
//!         calls += 1;
//!         if calls < 3 { Err(Flaky) } else { Ok(calls) }
//!     })
//!     .unwrap();
//! assert_eq!(value, 3);
//! ```

use crate::attempt::Attempt;
use crate::block::{BlockStrategy, ThreadBlock};
use crate::cancel::CancelToken;
use crate::error::RetryError;
use crate::limit::{OpSlot, TimeLimit};
use crate::listener::{FailedAttemptEvent, FailedAttemptHandler, RetryListener};
use crate::stop::Stop;
use crate::wait::Wait;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

type RejectFn<V, E> = dyn Fn(&Attempt<V, E>) -> bool + Send + Sync;

/// Retry execution engine. Cheap to clone; safe to share across threads.
pub struct Retryer<V, E> {
    stop: Stop,
    wait: Wait<E>,
    block: Arc<dyn BlockStrategy>,
    limit: TimeLimit,
    reject: Arc<RejectFn<V, E>>,
    listeners: Vec<Arc<dyn RetryListener<V, E>>>,
    handlers: Vec<Arc<dyn FailedAttemptHandler<V, E>>>,
}

impl<V, E> Clone for Retryer<V, E> {
    fn clone(&self) -> Self {
        Self {
            stop: self.stop.clone(),
            wait: self.wait.clone(),
            block: Arc::clone(&self.block),
            limit: self.limit,
            reject: Arc::clone(&self.reject),
            listeners: self.listeners.clone(),
            handlers: self.handlers.clone(),
        }
    }
}

impl<V, E> fmt::Debug for Retryer<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retryer")
            .field("stop", &self.stop)
            .field("wait", &self.wait)
            .field("block", &self.block)
            .field("limit", &self.limit)
            .field("reject", &"<predicate>")
            .field("listeners", &self.listeners.len())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl<V, E> Retryer<V, E>
where
    V: Send + 'static,
    E: Send + 'static,
{
    /// Construct a new builder with defaults: nothing is retried, no stop, no
    /// wait, thread blocking, no time limit.
    pub fn builder() -> RetryerBuilder<V, E> {
        RetryerBuilder::new()
    }

    /// Run `op` until an attempt is accepted, the stop strategy fires, or a
    /// failure outside the retry predicate surfaces.
    pub fn call<F>(&self, op: F) -> Result<V, RetryError<V, E>>
    where
        F: FnMut() -> Result<V, E> + Send + 'static,
    {
        self.call_cancellable(&CancelToken::new(), op)
    }

    /// Like [`Retryer::call`], but interruptible: cancelling `cancel` from
    /// another thread aborts the loop at its next wait boundary with an
    /// exhaustion error.
    pub fn call_cancellable<F>(
        &self,
        cancel: &CancelToken,
        op: F,
    ) -> Result<V, RetryError<V, E>>
    where
        F: FnMut() -> Result<V, E> + Send + 'static,
    {
        let mut slot = OpSlot::new(op, &self.limit);
        self.run(cancel, &mut slot)
    }

    /// Package `op` with this retryer into a reusable, individually
    /// cancellable call.
    pub fn wrap<F>(&self, op: F) -> RetryingCall<V, E, F>
    where
        F: FnMut() -> Result<V, E> + Send + 'static,
    {
        RetryingCall {
            retryer: self.clone(),
            slot: OpSlot::new(op, &self.limit),
            cancel: CancelToken::new(),
        }
    }

    fn run<F>(&self, cancel: &CancelToken, slot: &mut OpSlot<F>) -> Result<V, RetryError<V, E>>
    where
        F: FnMut() -> Result<V, E> + Send + 'static,
    {
        let started = Instant::now();
        let mut number: u64 = 1;
        loop {
            let outcome = self.limit.execute(slot);
            let attempt = Attempt::new(number, started.elapsed(), outcome);
            for listener in &self.listeners {
                listener.on_attempt(&attempt);
            }
            if !(self.reject)(&attempt) {
                tracing::trace!(attempt = number, "Attempt accepted");
                return attempt.into_outcome().map_err(RetryError::Inner);
            }
            if self.stop.should_stop(number, attempt.elapsed()) {
                tracing::debug!(attempts = number, "Retries exhausted");
                return Err(RetryError::Exhausted { attempts: number, last: attempt });
            }
            let delay = self.wait.delay(&attempt);
            if !self.handlers.is_empty() {
                let event = FailedAttemptEvent::new(delay, &attempt);
                for handler in &self.handlers {
                    handler.on_failed_attempt(&event);
                }
            }
            let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            tracing::trace!(attempt = number, delay_ms, "Attempt rejected, retrying");
            if self.block.block(delay, cancel).is_err() {
                tracing::debug!(attempts = number, "Retry loop cancelled");
                return Err(RetryError::Exhausted { attempts: number, last: attempt });
            }
            number += 1;
        }
    }
}

/// A retryer bound to one operation, produced by [`Retryer::wrap`]. Owns its
/// own [`CancelToken`] and can be run repeatedly.
pub struct RetryingCall<V, E, F> {
    retryer: Retryer<V, E>,
    slot: OpSlot<F>,
    cancel: CancelToken,
}

impl<V, E, F> RetryingCall<V, E, F>
where
    V: Send + 'static,
    E: Send + 'static,
    F: FnMut() -> Result<V, E> + Send + 'static,
{
    pub fn run(&mut self) -> Result<V, RetryError<V, E>> {
        self.retryer.run(&self.cancel, &mut self.slot)
    }

    /// Handle for cancelling this call from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

type ResultPredicate<V> = Arc<dyn Fn(&V) -> bool + Send + Sync>;

enum RetryCondition<V, E> {
    Predicate(Arc<RejectFn<V, E>>),
    Result(ResultPredicate<V>),
    Error(Arc<dyn Fn(&E) -> bool + Send + Sync>),
    Timeout,
    AnyError,
}

impl<V, E> RetryCondition<V, E> {
    fn matches(&self, attempt: &Attempt<V, E>) -> bool {
        match self {
            RetryCondition::Predicate(pred) => pred(attempt),
            RetryCondition::Result(pred) => attempt.result().is_some_and(|v| pred(v)),
            RetryCondition::Error(pred) => {
                attempt.error().and_then(|e| e.as_inner()).is_some_and(|e| pred(e))
            }
            RetryCondition::Timeout => attempt.error().is_some_and(|e| e.is_timeout()),
            RetryCondition::AnyError => attempt.has_error(),
        }
    }
}

/// Builder for [`Retryer`]. Conditions are OR'd: an attempt is retried when
/// any registered condition matches. With no conditions, every attempt is
/// accepted and errors surface immediately.
pub struct RetryerBuilder<V, E> {
    stop: Stop,
    wait: Wait<E>,
    block: Arc<dyn BlockStrategy>,
    limit: TimeLimit,
    conditions: Vec<RetryCondition<V, E>>,
    listeners: Vec<Arc<dyn RetryListener<V, E>>>,
    handlers: Vec<Arc<dyn FailedAttemptHandler<V, E>>>,
}

impl<V, E> Default for RetryerBuilder<V, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, E> RetryerBuilder<V, E> {
    pub fn new() -> Self {
        Self {
            stop: Stop::never(),
            wait: Wait::none(),
            block: Arc::new(ThreadBlock),
            limit: TimeLimit::none(),
            conditions: Vec::new(),
            listeners: Vec::new(),
            handlers: Vec::new(),
        }
    }

    pub fn stop(mut self, stop: Stop) -> Self {
        self.stop = stop;
        self
    }

    pub fn wait(mut self, wait: Wait<E>) -> Self {
        self.wait = wait;
        self
    }

    pub fn block(mut self, block: impl BlockStrategy + 'static) -> Self {
        self.block = Arc::new(block);
        self
    }

    pub fn time_limit(mut self, limit: TimeLimit) -> Self {
        self.limit = limit;
        self
    }

    /// Retry when `pred` matches the whole attempt.
    pub fn retry_if<F>(mut self, pred: F) -> Self
    where
        F: Fn(&Attempt<V, E>) -> bool + Send + Sync + 'static,
    {
        self.conditions.push(RetryCondition::Predicate(Arc::new(pred)));
        self
    }

    /// Retry when the attempt produced a value `pred` rejects.
    pub fn retry_if_result<F>(mut self, pred: F) -> Self
    where
        F: Fn(&V) -> bool + Send + Sync + 'static,
    {
        self.conditions.push(RetryCondition::Result(Arc::new(pred)));
        self
    }

    /// Retry when the attempt failed with an operation error `pred` matches.
    /// Timeouts are not operation errors; see [`RetryerBuilder::retry_if_timeout`].
    pub fn retry_if_error<F>(mut self, pred: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.conditions.push(RetryCondition::Error(Arc::new(pred)));
        self
    }

    /// Retry attempts that exceeded the per-attempt time limit.
    pub fn retry_if_timeout(mut self) -> Self {
        self.conditions.push(RetryCondition::Timeout);
        self
    }

    /// Retry every failed attempt, operation errors and timeouts alike.
    pub fn retry_if_any_error(mut self) -> Self {
        self.conditions.push(RetryCondition::AnyError);
        self
    }

    pub fn listener(mut self, listener: impl RetryListener<V, E> + 'static) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    pub fn failed_attempt_handler(
        mut self,
        handler: impl FailedAttemptHandler<V, E> + 'static,
    ) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn build(self) -> Retryer<V, E>
    where
        V: 'static,
        E: 'static,
    {
        let conditions = self.conditions;
        let reject: Arc<RejectFn<V, E>> = if conditions.is_empty() {
            Arc::new(|_| false)
        } else {
            Arc::new(move |attempt| conditions.iter().any(|c| c.matches(attempt)))
        };
        Retryer {
            stop: self.stop,
            wait: self.wait,
            block: self.block,
            limit: self.limit,
            reject,
            listeners: self.listeners,
            handlers: self.handlers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::AttemptError;
    use crate::block::{InstantBlock, TrackingBlock};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    struct Boom(&'static str);

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl std::error::Error for Boom {}

    #[test]
    fn default_builder_accepts_the_first_attempt() {
        let retryer = Retryer::<u32, Boom>::builder().build();
        assert_eq!(retryer.call(|| Ok::<_, Boom>(5)).unwrap(), 5);
    }

    #[test]
    fn default_builder_surfaces_errors_immediately() {
        let retryer = Retryer::<u32, Boom>::builder().build();
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let err = retryer
            .call(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(Boom("hard"))
            })
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, RetryError::Inner(AttemptError::Inner(Boom("hard")))));
    }

    #[test]
    fn retries_until_the_predicate_accepts() {
        let retryer = Retryer::<u32, Boom>::builder()
            .retry_if_any_error()
            .block(InstantBlock)
            .build();
        let mut calls = 0;
        let value = retryer
            .call(move || {
                calls += 1;
                if calls < 4 { Err(Boom("transient")) } else { Ok(calls) }
            })
            .unwrap();
        assert_eq!(value, 4);
    }

    #[test]
    fn stop_strategy_caps_total_attempts() {
        let retryer = Retryer::<u32, Boom>::builder()
            .retry_if_any_error()
            .stop(Stop::after_attempts(3).unwrap())
            .block(InstantBlock)
            .build();
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let err = retryer
            .call(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(Boom("always"))
            })
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.attempts(), Some(3));
        assert!(err.is_exhausted());
    }

    #[test]
    fn handlers_fire_only_on_the_continue_path() {
        // Three attempts under stop-after-3: the final attempt is rejected
        // but not followed by another, so handlers fire twice.
        let fired = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&fired);
        let retryer = Retryer::<u32, Boom>::builder()
            .retry_if_any_error()
            .stop(Stop::after_attempts(3).unwrap())
            .wait(Wait::fixed(Duration::from_millis(17)))
            .block(InstantBlock)
            .failed_attempt_handler(move |event: &FailedAttemptEvent<'_, u32, Boom>| {
                assert_eq!(event.next_wait(), Duration::from_millis(17));
                assert!(event.is_error());
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .build();
        let _ = retryer.call(|| Err::<u32, _>(Boom("always")));
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn listeners_see_every_attempt() {
        let numbers = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&numbers);
        let retryer = Retryer::<u32, Boom>::builder()
            .retry_if_result(|v| *v == 0)
            .stop(Stop::after_attempts(3).unwrap())
            .block(InstantBlock)
            .listener(move |attempt: &Attempt<u32, Boom>| {
                sink.lock().unwrap().push(attempt.number());
            })
            .build();
        let _ = retryer.call(|| Ok::<_, Boom>(0));
        assert_eq!(*numbers.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn wait_delays_are_handed_to_the_block_strategy() {
        let block = TrackingBlock::new();
        let retryer = Retryer::<u32, Boom>::builder()
            .retry_if_any_error()
            .stop(Stop::after_attempts(4).unwrap())
            .wait(Wait::exponential())
            .block(block.clone())
            .build();
        let _ = retryer.call(|| Err::<u32, _>(Boom("always")));
        assert_eq!(
            block.all_calls(),
            vec![
                Duration::from_millis(2),
                Duration::from_millis(4),
                Duration::from_millis(8)
            ]
        );
    }

    #[test]
    fn error_conditions_only_match_their_variant() {
        let retryer = Retryer::<u32, Boom>::builder()
            .retry_if_error(|e| e.0 == "transient")
            .block(InstantBlock)
            .build();
        let err = retryer.call(|| Err::<u32, _>(Boom("hard"))).unwrap_err();
        assert!(matches!(err, RetryError::Inner(AttemptError::Inner(Boom("hard")))));
    }

    #[test]
    fn wrapped_calls_are_reusable() {
        let retryer = Retryer::<u32, Boom>::builder()
            .retry_if_result(|v| *v % 2 == 1)
            .block(InstantBlock)
            .build();
        let mut calls = 0;
        let mut wrapped = retryer.wrap(move || {
            calls += 1;
            Ok::<_, Boom>(calls)
        });
        assert_eq!(wrapped.run().unwrap(), 2);
        assert_eq!(wrapped.run().unwrap(), 4);
    }

    #[test]
    fn cancellation_stops_the_loop_at_the_wait_boundary() {
        let retryer = Retryer::<u32, Boom>::builder()
            .retry_if_any_error()
            .wait(Wait::fixed(Duration::from_secs(30)))
            .build();
        let token = CancelToken::new();
        let remote = token.clone();
        let worker = std::thread::spawn(move || {
            retryer.call_cancellable(&remote, || Err::<u32, _>(Boom("always")))
        });
        std::thread::sleep(Duration::from_millis(50));
        token.cancel();
        let err = worker.join().unwrap().unwrap_err();
        assert_eq!(err.attempts(), Some(1));
        assert!(token.is_cancelled());
    }

    #[test]
    fn timeouts_are_retryable_when_opted_in() {
        let retryer = Retryer::<u32, Boom>::builder()
            .retry_if_timeout()
            .stop(Stop::after_attempts(2).unwrap())
            .time_limit(TimeLimit::fixed(Duration::from_millis(20)))
            .block(InstantBlock)
            .build();
        let mut calls = 0;
        let value = retryer
            .call(move || {
                calls += 1;
                if calls == 1 {
                    std::thread::sleep(Duration::from_millis(100));
                }
                Ok::<_, Boom>(calls)
            })
            .unwrap();
        assert_eq!(value, 2);
    }
}
