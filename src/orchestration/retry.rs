//! Retry with exponential backoff, applied to an operation before it is
//! handed to the queue.
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero behaves like one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            base_delay,
            ..Default::default()
        }
    }

    /// A policy that runs the operation exactly once.
    pub fn none() -> Self {
        RetryPolicy::new(1, Duration::ZERO)
    }

    /// Delay after the `attempt`-th failure (1-based): `base * 2^(attempt-1)`,
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails with an error `should_retry` rejects, or
/// the attempts run out. The last error is returned as is.
pub async fn retry<F, Fut, T, E, P>(policy: &RetryPolicy, mut op: F, should_retry: P) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && should_retry(&e) => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    ?delay,
                    error = %e,
                    "operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Wrap `op` into a single deferred operation that retries internally, ready
/// for `RequestQueue::submit`.
pub fn with_retry<F, Fut, T, E, P>(
    policy: RetryPolicy,
    op: F,
    should_retry: P,
) -> impl FnOnce() -> Pin<Box<dyn Future<Output = Result<T, E>> + Send>> + Send + 'static
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
    P: Fn(&E) -> bool + Send + Sync + 'static,
{
    move || -> Pin<Box<dyn Future<Output = Result<T, E>> + Send>> {
        Box::pin(async move { retry(&policy, op, should_retry).await })
    }
}
