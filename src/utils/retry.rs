use std::future::Future;

use crate::config::RetryConfig;

/// Runs `operation` until it succeeds or `max_attempts` is exhausted,
/// sleeping an exponentially growing backoff between attempts. Returns the
/// last error when every attempt fails.
pub async fn retry_with_backoff<F, Fut, T, E>(
    retry_config: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last_error = None;

    for attempt in 0..retry_config.max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                last_error = Some(e);

                if attempt + 1 < retry_config.max_attempts {
                    let backoff = retry_config.calculate_backoff(attempt);
                    tracing::debug!(
                        "attempt {}/{} failed, retrying in {:?}",
                        attempt + 1,
                        retry_config.max_attempts,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    Err(last_error.expect("max_attempts is at least 1"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_with_backoff(&fast_retry(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 1 {
                    Err("transient")
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = retry_with_backoff(&fast_retry(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("down") }
        })
        .await;
        assert_eq!(result, Err("down"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn backoff_is_capped() {
        let config = fast_retry(10);
        assert_eq!(config.calculate_backoff(0).as_millis(), 1);
        assert_eq!(config.calculate_backoff(1).as_millis(), 2);
        assert_eq!(config.calculate_backoff(8).as_millis(), 5);
    }
}
