use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::ServiceError;

/// Attempts and exponential backoff for idempotent calls (generation, lookup).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    /// One try plus one retry.
    pub fn single_retry(base_backoff: Duration) -> Self {
        Self {
            max_attempts: 2,
            base_backoff,
        }
    }

    /// Delay before attempt `attempt + 1`: base * 2^attempt.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(1u32 << attempt.min(16))
    }
}

/// Bound a call by `limit`, turning an elapsed deadline into `ServiceError::Timeout`.
pub async fn with_timeout<T, F>(service: &'static str, limit: Duration, call: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Timeout {
            service,
            after_ms: limit.as_millis() as u64,
        }),
    }
}

/// Run `op` until it succeeds or the policy is exhausted. Cancellation is never retried.
pub async fn retry<T, F, Fut>(service: &'static str, policy: RetryPolicy, mut op: F) -> Result<T, ServiceError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(ServiceError::Cancelled) => return Err(ServiceError::Cancelled),
            Err(e) if attempt + 1 < policy.max_attempts => {
                let delay = policy.backoff_for(attempt);
                warn!(service, attempt, ?delay, "call failed, retrying: {}", e);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
