//! Retry policy: exponential backoff with jitter on retryable faults.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use super::HttpError;

/// Configuration for a single retrying operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_wait: Duration,
    pub max_wait: Duration,
    /// Status codes to retry on beyond the defaults (429, 5xx, network faults).
    pub extra_status_codes: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            min_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(5),
            extra_status_codes: Vec::new(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, 10),
            ..Self::default()
        }
    }

    pub fn with_wait(mut self, min_wait: Duration, max_wait: Duration) -> Self {
        self.min_wait = min_wait;
        self.max_wait = max_wait;
        self
    }

    pub fn with_extra_status_codes(mut self, codes: Vec<u16>) -> Self {
        self.extra_status_codes = codes;
        self
    }

    fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.min_wait.as_secs_f64() * 2f64.powi(attempt as i32 - 1);
        let capped = exp.min(self.max_wait.as_secs_f64());
        let jitter = rand::thread_rng().gen_range(0.0..=capped * 0.25);
        Duration::from_secs_f64((capped + jitter).max(self.min_wait.as_secs_f64()))
    }
}

/// Runs `op` under the retry policy, never retrying non-retryable faults or
/// faults the caller's `is_retryable` closure rejects.
///
/// The final attempt's error is re-raised unchanged.
pub async fn retry_with_policy<T, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, HttpError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HttpError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = err.is_retryable(&policy.extra_status_codes);
                if !retryable || attempt >= policy.max_attempts {
                    return Err(err);
                }
                let wait = policy.backoff_for_attempt(attempt);
                warn!(attempt, error = %err, wait_ms = wait.as_millis() as u64, "retrying after transient HTTP failure");
                tokio::time::sleep(wait).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5).with_wait(Duration::from_millis(1), Duration::from_millis(5));

        let result = retry_with_policy(&policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(HttpError::Status {
                        status: 503,
                        url: "http://x".into(),
                        message: String::new(),
                        retryable: true,
                    })
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn never_retries_non_retryable_status() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5).with_wait(Duration::from_millis(1), Duration::from_millis(5));

        let result: Result<(), HttpError> = retry_with_policy(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Err(HttpError::Status {
                    status: 404,
                    url: "http://x".into(),
                    message: String::new(),
                    retryable: false,
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_budget_and_reraises_final_error() {
        let policy = RetryPolicy::new(3).with_wait(Duration::from_millis(1), Duration::from_millis(2));
        let result: Result<(), HttpError> = retry_with_policy(&policy, || async {
            Err(HttpError::Status {
                status: 500,
                url: "http://x".into(),
                message: "boom".into(),
                retryable: true,
            })
        })
        .await;

        match result.unwrap_err() {
            HttpError::Status { status, .. } => assert_eq!(status, 500),
            other => panic!("unexpected {other:?}"),
        }
    }
}
