use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::{ApiError, FetchError};
use crate::util::config::RetryConfig;

/// Bounded exponential backoff with jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_jitter: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: Duration::from_millis(cfg.base_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            max_jitter: Duration::from_millis(cfg.max_jitter_ms),
        }
    }

    /// Delay before retry number `retry` (0-based). A server-provided
    /// Retry-After wins when it is longer than the computed delay.
    pub fn backoff(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let exponential = self.base_delay.saturating_mul(1u32 << retry.min(16));
        let capped = exponential.min(self.max_delay);
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(fastrand::u64(0..=jitter_ms))
        };
        let delay = capped + jitter;
        match retry_after {
            Some(server) if server > delay => server,
            _ => delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Run `call` until it succeeds, fails with a non-retryable error, runs out
/// of attempts, or `cancel` fires. `key` and `call_desc` only feed logs and
/// errors. The successful value is returned untouched.
pub async fn retry_call<T, F, Fut>(
    cancel: &CancellationToken,
    policy: &RetryPolicy,
    key: &str,
    call_desc: &str,
    mut call: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let cancelled = || FetchError::Cancelled {
        call: call_desc.to_string(),
    };

    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        attempt += 1;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            res = call() => res,
        };

        let err = match outcome {
            Ok(value) => {
                if attempt > 1 {
                    debug!(key, call = call_desc, attempt, "GitHub call recovered");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !err.is_retryable() {
            return Err(FetchError::Fatal {
                call: call_desc.to_string(),
                source: err,
            });
        }
        if attempt >= policy.max_attempts {
            return Err(FetchError::Exhausted {
                call: call_desc.to_string(),
                attempts: attempt,
                source: err,
            });
        }

        let delay = policy.backoff(attempt - 1, err.retry_after());
        warn!(
            key,
            call = call_desc,
            retry = attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retrying GitHub call"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
