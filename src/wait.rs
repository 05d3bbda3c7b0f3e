//! Wait strategies: compute the delay before the next attempt.
//!
//! Attempt semantics: strategies see the rejected [`Attempt`], whose number is
//! 1-based. Arithmetic is carried out in saturating integer milliseconds and
//! clamped to the configured maximum (default maximum is effectively
//! unbounded), so overflowing formulas clamp instead of wrapping or panicking.
//!
//! Randomized strategies draw from `rand`'s thread-local RNG by default;
//! deterministic RNGs can be injected via [`Wait::delay_with_rng`].
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use reattempt::Wait;
//!
//! let wait: Wait<std::io::Error> =
//!     Wait::exponential().with_max(Duration::from_millis(40)).unwrap();
//! // attempt 1 -> 2ms, attempt 2 -> 4ms, ..., attempt 6+ -> capped at 40ms
//! ```

use crate::attempt::{Attempt, AttemptError};
use crate::error::ConfigError;
use rand::{rng, Rng};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Ceiling used when no explicit maximum is configured (effectively unbounded).
pub const MAX_WAIT: Duration = Duration::from_millis(u64::MAX);

type OnErrorFn<E> = dyn Fn(&AttemptError<E>) -> Option<Duration> + Send + Sync;
type CustomFn = dyn Fn(u64, Duration) -> Duration + Send + Sync;

/// Wait strategy computing the delay before the next attempt.
pub struct Wait<E> {
    kind: WaitKind<E>,
}

enum WaitKind<E> {
    None,
    Fixed(Duration),
    Incrementing { initial: Duration, increment: Duration },
    Random { min: Duration, max: Duration },
    Exponential { multiplier: Duration, max: Duration },
    Fibonacci { multiplier: Duration, max: Duration },
    FullJitter { base: Duration, multiplier: f64, cap: Duration },
    OnError(Arc<OnErrorFn<E>>),
    Join(Vec<Wait<E>>),
    Custom(Arc<CustomFn>),
}

impl<E> Wait<E> {
    /// No wait: always 0.
    pub fn none() -> Self {
        Self { kind: WaitKind::None }
    }

    /// Constant delay regardless of attempt number or elapsed time.
    pub fn fixed(delay: Duration) -> Self {
        Self { kind: WaitKind::Fixed(delay) }
    }

    /// `initial + increment * (attempt_number - 1)`, saturating.
    pub fn incrementing(initial: Duration, increment: Duration) -> Self {
        Self { kind: WaitKind::Incrementing { initial, increment } }
    }

    /// Uniform random delay in `[min, max)`. Requires `min < max`.
    pub fn random(min: Duration, max: Duration) -> Result<Self, ConfigError> {
        if min >= max {
            return Err(ConfigError::EmptyRandomRange { min, max });
        }
        Ok(Self { kind: WaitKind::Random { min, max } })
    }

    /// Uniform random delay in `[0, max)`. Requires `max > 0`.
    pub fn random_max(max: Duration) -> Result<Self, ConfigError> {
        Self::random(Duration::ZERO, max)
    }

    /// `multiplier * 2^attempt_number` with a 1 ms multiplier: 2, 4, 8, 16, … ms.
    pub fn exponential() -> Self {
        Self::exponential_with(Duration::from_millis(1))
    }

    /// `multiplier * 2^attempt_number`, uncapped until [`Wait::with_max`].
    pub fn exponential_with(multiplier: Duration) -> Self {
        Self { kind: WaitKind::Exponential { multiplier, max: MAX_WAIT } }
    }

    /// `fib(attempt_number) * multiplier` (1, 1, 2, 3, 5, 8, 13, … ms) with a
    /// 1 ms multiplier.
    pub fn fibonacci() -> Self {
        Self::fibonacci_with(Duration::from_millis(1))
    }

    /// `fib(attempt_number) * multiplier`, uncapped until [`Wait::with_max`].
    pub fn fibonacci_with(multiplier: Duration) -> Self {
        Self { kind: WaitKind::Fibonacci { multiplier, max: MAX_WAIT } }
    }

    /// Uniform random delay in `[0, min(cap, base * multiplier^attempt_number))`.
    /// Requires a finite, positive multiplier.
    pub fn full_jitter(base: Duration, multiplier: f64, cap: Duration) -> Result<Self, ConfigError> {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(ConfigError::BadJitterMultiplier(multiplier));
        }
        Ok(Self { kind: WaitKind::FullJitter { base, multiplier, cap } })
    }

    /// Delay derived from the failure cause: the mapped delay when `f` matches
    /// the current attempt's cause (`Some`), otherwise 0. Rejected-result
    /// attempts always wait 0.
    pub fn on_error<F>(f: F) -> Self
    where
        F: Fn(&AttemptError<E>) -> Option<Duration> + Send + Sync + 'static,
    {
        Self { kind: WaitKind::OnError(Arc::new(f)) }
    }

    /// Composite strategy returning the maximum of all sub-results.
    ///
    /// Emptiness is deliberately not validated here; evaluating an empty join
    /// is a configuration error raised at computation time.
    pub fn join(strategies: Vec<Wait<E>>) -> Self {
        Self { kind: WaitKind::Join(strategies) }
    }

    /// Custom delay function over `(attempt_number, elapsed)`.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(u64, Duration) -> Duration + Send + Sync + 'static,
    {
        Self { kind: WaitKind::Custom(Arc::new(f)) }
    }

    /// Cap the computed delay (exponential or fibonacci only). Returns an
    /// error for strategies without a cap and for a zero cap.
    pub fn with_max(mut self, max: Duration) -> Result<Self, ConfigError> {
        if max.is_zero() {
            return Err(ConfigError::ZeroMax);
        }
        match &mut self.kind {
            WaitKind::Exponential { max: existing, .. }
            | WaitKind::Fibonacci { max: existing, .. } => {
                *existing = max;
                Ok(self)
            }
            _ => Err(ConfigError::MaxNotSupported),
        }
    }

    /// Compute the delay before the attempt following `attempt`.
    pub fn delay<V>(&self, attempt: &Attempt<V, E>) -> Duration {
        let mut rng = rng();
        self.delay_internal(attempt, &mut rng)
    }

    /// Compute the delay with a caller-supplied RNG (for deterministic tests).
    pub fn delay_with_rng<V, R: Rng>(&self, attempt: &Attempt<V, E>, rng: &mut R) -> Duration {
        self.delay_internal(attempt, rng)
    }

    fn delay_internal<V, R: Rng>(&self, attempt: &Attempt<V, E>, rng: &mut R) -> Duration {
        let number = attempt.number();
        match &self.kind {
            WaitKind::None => Duration::ZERO,
            WaitKind::Fixed(delay) => *delay,
            WaitKind::Incrementing { initial, increment } => {
                let steps = u128::from(number.saturating_sub(1));
                let extra = millis(*increment).saturating_mul(steps);
                from_millis_clamped(millis(*initial).saturating_add(extra))
            }
            WaitKind::Random { min, max } => {
                let low = millis_u64(*min);
                let high = millis_u64(*max);
                if low >= high {
                    return Duration::from_millis(low);
                }
                Duration::from_millis(rng.random_range(low..high))
            }
            WaitKind::Exponential { multiplier, max } => {
                let exponent = u32::try_from(number).unwrap_or(u32::MAX);
                let factor = 2u128.saturating_pow(exponent);
                let raw = millis(*multiplier).saturating_mul(factor);
                from_millis_clamped(raw.min(millis(*max)))
            }
            WaitKind::Fibonacci { multiplier, max } => {
                let raw = fib_saturating(number).saturating_mul(millis(*multiplier));
                from_millis_clamped(raw.min(millis(*max)))
            }
            WaitKind::FullJitter { base, multiplier, cap } => {
                let exponent = i32::try_from(number).unwrap_or(i32::MAX);
                let raw = millis_u64(*base) as f64 * multiplier.powi(exponent);
                let cap_ms = millis_u64(*cap) as f64;
                let bound = if raw.is_finite() { raw.min(cap_ms) } else { cap_ms };
                if bound <= 0.0 {
                    return Duration::ZERO;
                }
                Duration::from_millis(rng.random_range(0.0..bound) as u64)
            }
            WaitKind::OnError(f) => match attempt.error() {
                Some(cause) => f(cause).unwrap_or(Duration::ZERO),
                None => Duration::ZERO,
            },
            WaitKind::Join(strategies) => {
                assert!(
                    !strategies.is_empty(),
                    "join wait strategy evaluated with no sub-strategies"
                );
                strategies
                    .iter()
                    .map(|s| s.delay_internal(attempt, rng))
                    .max()
                    .unwrap_or(Duration::ZERO)
            }
            WaitKind::Custom(f) => f(number, attempt.elapsed()),
        }
    }
}

fn millis(d: Duration) -> u128 {
    d.as_millis()
}

fn millis_u64(d: Duration) -> u64 {
    d.as_millis().try_into().unwrap_or(u64::MAX) // saturate extremely large durations
}

fn from_millis_clamped(ms: u128) -> Duration {
    Duration::from_millis(ms.min(u128::from(u64::MAX)) as u64)
}

/// Fibonacci value at `n` (1, 1, 2, 3, 5, 8, …), saturating at `u128::MAX`.
/// Saturation short-circuits the walk, so huge attempt numbers stay cheap.
fn fib_saturating(n: u64) -> u128 {
    let mut prev: u128 = 1;
    let mut curr: u128 = 1;
    let mut i: u64 = 2;
    while i < n && curr < u128::MAX {
        let next = prev.saturating_add(curr);
        prev = curr;
        curr = next;
        i += 1;
    }
    curr
}

impl<E> Clone for Wait<E> {
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            WaitKind::None => WaitKind::None,
            WaitKind::Fixed(delay) => WaitKind::Fixed(*delay),
            WaitKind::Incrementing { initial, increment } => {
                WaitKind::Incrementing { initial: *initial, increment: *increment }
            }
            WaitKind::Random { min, max } => WaitKind::Random { min: *min, max: *max },
            WaitKind::Exponential { multiplier, max } => {
                WaitKind::Exponential { multiplier: *multiplier, max: *max }
            }
            WaitKind::Fibonacci { multiplier, max } => {
                WaitKind::Fibonacci { multiplier: *multiplier, max: *max }
            }
            WaitKind::FullJitter { base, multiplier, cap } => {
                WaitKind::FullJitter { base: *base, multiplier: *multiplier, cap: *cap }
            }
            WaitKind::OnError(f) => WaitKind::OnError(Arc::clone(f)),
            WaitKind::Join(strategies) => WaitKind::Join(strategies.clone()),
            WaitKind::Custom(f) => WaitKind::Custom(Arc::clone(f)),
        };
        Self { kind }
    }
}

impl<E> fmt::Debug for Wait<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            WaitKind::None => write!(f, "Wait::None"),
            WaitKind::Fixed(delay) => write!(f, "Wait::Fixed({:?})", delay),
            WaitKind::Incrementing { initial, increment } => {
                write!(f, "Wait::Incrementing({:?} + {:?}/attempt)", initial, increment)
            }
            WaitKind::Random { min, max } => write!(f, "Wait::Random({:?}..{:?})", min, max),
            WaitKind::Exponential { multiplier, max } => {
                write!(f, "Wait::Exponential(x{:?}, max {:?})", multiplier, max)
            }
            WaitKind::Fibonacci { multiplier, max } => {
                write!(f, "Wait::Fibonacci(x{:?}, max {:?})", multiplier, max)
            }
            WaitKind::FullJitter { base, multiplier, cap } => {
                write!(f, "Wait::FullJitter({:?} * {}^n, cap {:?})", base, multiplier, cap)
            }
            WaitKind::OnError(_) => write!(f, "Wait::OnError(<mapper>)"),
            WaitKind::Join(strategies) => f.debug_tuple("Wait::Join").field(strategies).finish(),
            WaitKind::Custom(_) => write!(f, "Wait::Custom(<fn>)"),
        }
    }
}
