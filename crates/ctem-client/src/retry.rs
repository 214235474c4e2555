//! Retry policy for reads
//!
//! Fixed interval, bounded attempts, only for errors
//! [`ApiError::is_retryable`](crate::ApiError::is_retryable) accepts.

use crate::error::ApiResult;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Fixed-interval retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the initial request
    pub max_attempts: u32,
    /// Delay between attempts, milliseconds
    pub interval_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            interval_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Never retry
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            interval_ms: 0,
        }
    }

    /// Custom policy
    #[inline]
    #[must_use]
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Delay between attempts
    #[inline]
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Run `op`, retrying retryable failures
    ///
    /// # Errors
    /// Returns the first non-retryable error, or the last error once the
    /// attempts are used up.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let mut retries = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && retries < self.max_attempts => {
                    retries += 1;
                    warn!(
                        target_path = label,
                        attempt = retries,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "Retrying request"
                    );
                    tokio::time::sleep(self.interval()).await;
                }
                Err(err) => {
                    if retries > 0 {
                        debug!(target_path = label, retries, error = %err, "Giving up after retries");
                    }
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn retries_server_errors_at_fixed_interval() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = tokio::time::Instant::now();

        let counter = calls.clone();
        let result: ApiResult<()> = RetryPolicy::default()
            .run("/x", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ApiError::http(503, "unavailable"))
                }
            })
            .await;

        assert_eq!(result.unwrap_err().status_code(), Some(503));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: ApiResult<()> = RetryPolicy::default()
            .run("/x", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::http(404, "missing")) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::fixed(3, Duration::from_millis(10))
            .run("/x", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(ApiError::Timeout)
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 1);
    }
}
