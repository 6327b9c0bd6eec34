//! Shared exponential backoff retry logic for completion providers.

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use tracing::debug;

const INITIAL_INTERVAL_MILLIS: u64 = 500;
const MAX_INTERVAL_SECS: u64 = 8;

/// Retry an async operation with exponential backoff.
///
/// `attempt` is called up to `max_attempts` times (at least once). Errors for
/// which `is_retryable` returns false are returned immediately; otherwise the
/// task sleeps for an exponentially increasing duration before the next
/// attempt. The last error is returned once attempts run out.
pub async fn retry_with_backoff<T, E, Fut, F, R>(
    max_attempts: u32,
    mut attempt: F,
    is_retryable: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
{
    let max_attempts = max_attempts.max(1);
    let mut backoff = ExponentialBackoff {
        initial_interval: Duration::from_millis(INITIAL_INTERVAL_MILLIS),
        max_interval: Duration::from_secs(MAX_INTERVAL_SECS),
        max_elapsed_time: None,
        ..Default::default()
    };

    let mut attempts = 0;
    loop {
        attempts += 1;

        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempts >= max_attempts || !is_retryable(&e) {
                    return Err(e);
                }
                if let Some(wait_duration) = backoff.next_backoff() {
                    debug!(
                        "Attempt {}/{} failed, retrying in {:?}",
                        attempts, max_attempts, wait_duration
                    );
                    tokio::time::sleep(wait_duration).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    enum TestError {
        Transient,
        Fatal,
    }

    fn transient(e: &TestError) -> bool {
        *e == TestError::Transient
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_on_first_attempt() {
        let result: Result<&str, TestError> =
            retry_with_backoff(3, || async { Ok("ok") }, transient).await;
        assert_eq!(result.unwrap(), "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausts_after_max_attempts() {
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = count.clone();

        let result: Result<(), TestError> = retry_with_backoff(
            3,
            move || {
                let c = count_clone.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(TestError::Transient)
                }
            },
            transient,
        )
        .await;

        assert_eq!(result, Err(TestError::Transient));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_stops_on_fatal_error() {
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = count.clone();

        let result: Result<(), TestError> = retry_with_backoff(
            5,
            move || {
                let c = count_clone.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(TestError::Fatal)
                }
            },
            transient,
        )
        .await;

        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_failures() {
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = count.clone();

        let result: Result<&str, TestError> = retry_with_backoff(
            3,
            move || {
                let c = count_clone.clone();
                async move {
                    let n = c.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(TestError::Transient)
                    } else {
                        Ok("recovered")
                    }
                }
            },
            transient,
        )
        .await;

        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_runs_once() {
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = count.clone();

        let _: Result<(), TestError> = retry_with_backoff(
            0,
            move || {
                let c = count_clone.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(TestError::Transient)
                }
            },
            transient,
        )
        .await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
