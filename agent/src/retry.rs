//! Retry utility with exponential backoff

use std::time::{Duration, Instant};
use tracing::debug;

/// Retry an async operation with exponential backoff until `deadline`.
///
/// Returns `Ok` on first success, or the last `Err` once the deadline leaves no
/// time for another attempt. Delays: `initial_delay`, `2 * initial_delay`, ...
/// capped at `max_delay` and at the time remaining.
pub async fn retry_with_backoff<F, Fut, T, E>(
    operation_name: &str,
    deadline: Instant,
    initial_delay: Duration,
    max_delay: Duration,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = initial_delay;
    let mut attempt = 1u32;

    loop {
        match f().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    debug!("{} failed (attempt {}, giving up): {}", operation_name, attempt, e);
                    return Err(e);
                }
                debug!("{} failed (attempt {}): {}", operation_name, attempt, e);
                tokio::time::sleep(delay.min(remaining)).await;
                delay = (delay * 2).min(max_delay);
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn soon() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let result: Result<&str, String> = retry_with_backoff(
            "test",
            soon(),
            Duration::from_millis(1),
            Duration::from_millis(4),
            || async { Ok("done") },
        )
        .await;
        assert_eq!(result.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_succeeds_after_retries() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let result: Result<&str, String> = retry_with_backoff(
            "test",
            soon(),
            Duration::from_millis(1),
            Duration::from_millis(4),
            move || {
                let counter = counter_clone.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::Relaxed);
                    if n < 2 {
                        Err(format!("fail #{}", n))
                    } else {
                        Ok("done")
                    }
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_gives_up_at_deadline() {
        let started = Instant::now();
        let result: Result<(), String> = retry_with_backoff(
            "test",
            started + Duration::from_millis(30),
            Duration::from_millis(1),
            Duration::from_millis(8),
            || async { Err("always fails".to_string()) },
        )
        .await;
        assert_eq!(result.unwrap_err(), "always fails");
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
