// Bounded retry with exponential backoff for start-up connections
//
// Only used off the request path: warming the shared counting store connection
// at start-up. Request handling never retries.

use backoff::{backoff::Backoff, ExponentialBackoff};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Create exponential backoff configuration for start-up retries
pub fn create_backoff(max_elapsed: Duration) -> ExponentialBackoff {
    ExponentialBackoff {
        current_interval: Duration::from_millis(100), // Start at 100ms
        initial_interval: Duration::from_millis(100),
        randomization_factor: 0.3, // Add jitter
        multiplier: 2.0,           // Double each time
        max_interval: Duration::from_secs(2),
        max_elapsed_time: Some(max_elapsed),
        ..Default::default()
    }
}

/// Run `operation` until it succeeds, `max_attempts` is reached or the backoff
/// gives up. Returns the last error on failure.
pub async fn with_retry<F, Fut, T, E>(
    operation_name: &str,
    max_attempts: u32,
    max_elapsed: Duration,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut backoff = create_backoff(max_elapsed);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                if attempt >= max_attempts {
                    return Err(e);
                }
                let Some(delay) = backoff.next_backoff() else {
                    return Err(e);
                };
                debug!(
                    "{} failed (attempt {}): {}, retrying after {}ms",
                    operation_name,
                    attempt,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<u32, String> =
            with_retry("flaky", 5, Duration::from_secs(5), move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("attempt {} failed", n))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), String> =
            with_retry("down", 2, Duration::from_secs(5), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("refused".to_string())
            })
            .await;

        assert_eq!(result.unwrap_err(), "refused");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_is_bounded() {
        let backoff = create_backoff(Duration::from_secs(3));
        assert_eq!(backoff.max_elapsed_time, Some(Duration::from_secs(3)));
        assert_eq!(backoff.initial_interval, Duration::from_millis(100));
    }
}
