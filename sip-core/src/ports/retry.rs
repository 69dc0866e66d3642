use std::time::Duration;

/// Retry schedule for transient fetch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each attempt thereafter.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    fn delay(&self, failed_attempts: u32) -> Duration {
        self.backoff * 2u32.saturating_pow(failed_attempts.saturating_sub(1))
    }
}

/// Run a fallible async operation under a retry policy.
///
/// Retries on every error until the policy is exhausted, then propagates the
/// final error. Intended for [`MarketDataSource`](super::MarketDataSource)
/// implementations wrapping remote calls; the engine itself never retries.
pub async fn with_retries<T, E, F, Fut>(policy: RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < policy.max_attempts => {
                let delay = policy.delay(attempt);
                tracing::warn!(%error, attempt, ?delay, "fetch failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
