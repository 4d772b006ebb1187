// Retry and backoff policy for remote store operations.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::errors::StoreError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following failure number `attempt`:
    /// `min(base_delay * 2^attempt, max_delay)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

/// A successful operation plus the number of attempts it took.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub value: T,
    pub attempts: u32,
}

#[derive(Debug, Clone, Default)]
pub struct RetryHandler {
    policy: RetryPolicy,
}

impl RetryHandler {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation`, retrying transient failures with exponential backoff.
    ///
    /// Terminal errors propagate on the first occurrence. Exhausting the
    /// attempt budget surfaces the last observed error; there is no fallback.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        self.execute_tracked(operation).await.map(|o| o.value)
    }

    /// Like [`execute`](Self::execute), but reports how many attempts were
    /// consumed so the cache can record them.
    pub async fn execute_tracked<T, F, Fut>(
        &self,
        mut operation: F,
    ) -> Result<RetryOutcome<T>, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => {
                    debug!(attempt, "remote operation succeeded");
                    return Ok(RetryOutcome {
                        value,
                        attempts: attempt,
                    });
                }
                Err(err) if err.is_retryable() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.backoff_delay(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "remote operation failed, retrying"
                    );
                    crate::observability::cache_metrics().record_retry();
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(attempt, error = %err, "remote operation failed");
                    crate::observability::cache_metrics().record_error();
                    return Err(err);
                }
            }
        }
    }
}
