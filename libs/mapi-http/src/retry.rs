//! Retry policy shared by the retry layer and the upload helper.
//!
//! A failed attempt is retried when it is transient: HTTP 429, any status of
//! 500 and above, or no response at all (transport failure, attempt timeout).
//! Other statuses are terminal and returned on the first attempt.
//!
//! The wait before retry `n` (1-based) is `(retry_delay - jitter) * n`, where
//! `jitter` is drawn uniformly from `[1, max_jitter]` milliseconds and the
//! subtraction saturates at zero.

use crate::error::HttpError;
use http::StatusCode;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Upper bound of the random jitter subtracted from every retry delay
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(500);

/// Status classifier used by the default policies.
#[must_use]
pub fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500
}

/// Delay before the `retry_count`-th retry.
#[must_use]
pub fn retry_delay(base: Duration, retry_count: u32, jitter: Duration) -> Duration {
    base.saturating_sub(jitter).saturating_mul(retry_count)
}

/// Retry parameters attached to a single logical request.
///
/// A request without a policy is attempted exactly once.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the initial attempt; total attempts are `retries + 1`
    pub retries: u32,
    /// Base delay, multiplied by the retry count
    pub retry_delay: Duration,
    /// Upper bound of the jitter subtracted from `retry_delay`
    pub max_jitter: Duration,
    /// Decides whether a non-2xx status is worth another attempt
    pub is_retryable: fn(StatusCode) -> bool,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(retries: u32, retry_delay: Duration) -> Self {
        Self {
            retries,
            retry_delay,
            max_jitter: DEFAULT_MAX_JITTER,
            is_retryable: is_transient_status,
        }
    }

    /// Short bursts of retries for ordinary reads and writes (5 @ 1s)
    #[must_use]
    pub fn burst() -> Self {
        Self::new(5, Duration::from_millis(1000))
    }

    /// Long retry budget for asset registration (20 @ 1.25s)
    #[must_use]
    pub fn extended() -> Self {
        Self::new(20, Duration::from_millis(1250))
    }

    /// Retry budget for uploads to asset storage (10 @ 1s)
    #[must_use]
    pub fn upload() -> Self {
        Self::new(10, Duration::from_millis(1000))
    }

    #[must_use]
    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    #[must_use]
    pub fn with_classifier(mut self, is_retryable: fn(StatusCode) -> bool) -> Self {
        self.is_retryable = is_retryable;
        self
    }

    #[must_use]
    pub fn should_retry_status(&self, status: StatusCode) -> bool {
        !status.is_success() && (self.is_retryable)(status)
    }

    /// Whether a failed attempt is transient under this policy.
    #[must_use]
    pub fn should_retry_error(&self, err: &HttpError) -> bool {
        match err {
            HttpError::HttpStatus { status, .. } => self.should_retry_status(*status),
            HttpError::Transport(_) | HttpError::Timeout(_) => true,
            _ => false,
        }
    }

    /// Delay before retry number `retry_count`, with fresh jitter.
    #[must_use]
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        retry_delay(self.retry_delay, retry_count, self.sample_jitter())
    }

    fn sample_jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(1..=max_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::burst()
    }
}

/// Run `attempt` until it succeeds, fails terminally or the policy is exhausted.
///
/// Each call of `attempt` must rebuild the whole request. On exhaustion the
/// last error is returned.
///
/// # Errors
/// Returns the error of the last attempt.
pub async fn retry_async<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut attempt: F,
) -> Result<T, HttpError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HttpError>>,
{
    let mut retry_count = 0u32;
    loop {
        let err = match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !policy.should_retry_error(&err) {
            return Err(err);
        }

        if retry_count >= policy.retries {
            tracing::warn!(
                operation,
                attempts = retry_count.saturating_add(1),
                error = %err,
                "retry threshold reached"
            );
            return Err(err);
        }

        retry_count += 1;
        let delay = policy.delay_for(retry_count);
        tracing::debug!(
            operation,
            retry = retry_count,
            retries = policy.retries,
            error = %err,
            delay_ms = delay.as_millis(),
            "Retrying after transient failure"
        );
        tokio::time::sleep(delay).await;
    }
}
