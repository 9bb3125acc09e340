//! Bounded retry for idempotent cluster API calls

use crate::api::ApiError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run an idempotent API call with up to `max_attempts` attempts and a fixed
/// backoff interval. Non-retryable errors escalate immediately; the attempt
/// count that produced the final outcome is returned alongside it.
pub async fn with_retries<T, F, Fut>(
    operation: &str,
    max_attempts: u32,
    interval: Duration,
    mut call: F,
) -> (Result<T, ApiError>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match call().await {
            Ok(value) => return (Ok(value), attempt),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    operation, attempt, max_attempts, interval, e
                );
                tokio::time::sleep(interval).await;
            }
            Err(e) => return (Err(e), attempt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let (result, attempts) = with_retries("submit", 5, Duration::from_secs(2), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Err(ApiError::Transport("connection refused".to_string()))
                } else {
                    Ok("job-1".to_string())
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "job-1");
        assert_eq!(attempts, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_attempts_on_persistent_failure() {
        let (result, attempts) = with_retries("status", 3, Duration::from_secs(1), || async {
            Err::<(), _>(ApiError::Server {
                status: 500,
                message: "boom".to_string(),
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_never_retry() {
        let calls = AtomicU32::new(0);
        let (result, attempts) = with_retries("submit", 5, Duration::from_secs(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), _>(ApiError::Rejected {
                    status: 400,
                    message: "invalid payload".to_string(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
