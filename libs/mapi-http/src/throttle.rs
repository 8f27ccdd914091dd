//! Call-start throttle.
//!
//! A [`Throttle`] lets at most `calls_per_interval` calls *start* inside any
//! window of length `interval`. Starts are spaced by `interval /
//! calls_per_interval` (rounded up), so no window can hold one more. Callers
//! above the budget wait in submission order; none are dropped. Completion
//! order is not constrained.

use crate::config::ThrottleConfig;
use governor::clock::Clock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Reads tokio's clock, so paused test time drives the limiter too.
#[derive(Debug, Clone, Copy, Default)]
struct TokioClock;

impl Clock for TokioClock {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now().into_std()
    }
}

type StartLimiter =
    RateLimiter<NotKeyed, InMemoryState, TokioClock, NoOpMiddleware<std::time::Instant>>;

struct ThrottleState {
    calls_per_interval: usize,
    interval: Duration,
    limiter: StartLimiter,
    // tokio's Mutex queues waiters FIFO, which gives the start ordering.
    turn: Mutex<()>,
}

/// Shared throttle handle. Clones share one window; separate `new` calls do not.
#[derive(Clone)]
pub struct Throttle {
    state: Arc<ThrottleState>,
}

impl std::fmt::Debug for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle")
            .field("calls_per_interval", &self.state.calls_per_interval)
            .field("interval", &self.state.interval)
            .finish_non_exhaustive()
    }
}

/// Gap between two starts: `interval / calls`, rounded up to the nanosecond.
fn start_spacing(calls_per_interval: usize, interval: Duration) -> Duration {
    let calls = u128::try_from(calls_per_interval).unwrap_or(u128::MAX);
    let nanos = interval.as_nanos().div_ceil(calls);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

impl Throttle {
    /// Create a throttle admitting `calls_per_interval` starts per `interval`.
    ///
    /// A budget of zero is treated as one.
    #[must_use]
    pub fn new(calls_per_interval: usize, interval: Duration) -> Self {
        let calls_per_interval = calls_per_interval.max(1);
        let spacing = start_spacing(calls_per_interval, interval);
        let quota = Quota::with_period(spacing)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
            .allow_burst(NonZeroU32::MIN);
        Self {
            state: Arc::new(ThrottleState {
                calls_per_interval,
                interval,
                limiter: RateLimiter::direct_with_clock(quota, TokioClock),
                turn: Mutex::new(()),
            }),
        }
    }

    #[must_use]
    pub fn from_config(config: ThrottleConfig) -> Self {
        Self::new(config.calls_per_interval, config.interval)
    }

    #[must_use]
    pub fn calls_per_interval(&self) -> usize {
        self.state.calls_per_interval
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.state.interval
    }

    /// Wait until one more call may start, then record its start.
    ///
    /// Cancel-safe: a start is only recorded when the future completes, so a
    /// dropped waiter leaves the window as it was.
    pub async fn acquire(&self) {
        let _turn = self.state.turn.lock().await;
        while let Err(not_until) = self.state.limiter.check() {
            let wait = not_until.wait_time_from(TokioClock.now());
            tracing::trace!(wait_ms = wait.as_millis(), "throttle window full, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Wrap an async function so every invocation goes through this throttle.
    #[must_use]
    pub fn wrap<F>(&self, f: F) -> Throttled<F> {
        Throttled {
            throttle: self.clone(),
            f,
        }
    }
}

/// An async function bound to a [`Throttle`]. See [`Throttle::wrap`].
#[derive(Clone, Debug)]
pub struct Throttled<F> {
    throttle: Throttle,
    f: F,
}

impl<F> Throttled<F> {
    /// Wait for a slot, then run the wrapped function with `arg`.
    pub async fn call<A, Fut>(&self, arg: A) -> Fut::Output
    where
        F: Fn(A) -> Fut,
        Fut: Future,
    {
        self.throttle.acquire().await;
        (self.f)(arg).await
    }

    #[must_use]
    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }
}
