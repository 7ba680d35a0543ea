//! Retry with exponential backoff for schema fetches.

use std::time::Duration;

use tokio::time::sleep;

use crate::error::BridgeError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

/// Whether an error is worth retrying: timeouts always, upstream 5xx/429,
/// and fetch failures that look like connectivity problems. Parse failures
/// and config errors are permanent.
pub fn is_transient(err: &BridgeError) -> bool {
    match err {
        BridgeError::Timeout(_) => true,
        BridgeError::Upstream { code, .. } => {
            matches!(code.as_str(), "429" | "500" | "502" | "503" | "504")
        }
        BridgeError::Fetch(message) => {
            let message = message.to_lowercase();
            message.contains("connect")
                || message.contains("timed out")
                || message.contains("connection reset")
                || message.contains("temporarily unavailable")
        }
        _ => false,
    }
}

/// Execute an async operation, retrying transient failures with
/// exponential backoff. The last error is returned once attempts are
/// exhausted.
pub async fn with_retry<T, F, Fut>(config: RetryConfig, mut operation: F) -> Result<T, BridgeError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, BridgeError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Operation succeeded after retries");
                }
                return Ok(result);
            }
            Err(error) if is_transient(&error) && attempt < config.max_attempts => {
                let exp = config.initial_delay.as_secs_f64()
                    * config.backoff_multiplier.powi(attempt as i32 - 1);
                let delay = Duration::from_secs_f64(exp.min(config.max_delay.as_secs_f64()));
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, error = %error, "Transient error, retrying");
                sleep(delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = with_retry(fast_config(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, BridgeError>("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = with_retry(fast_config(), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(BridgeError::Timeout("slow upstream".to_string()))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = with_retry(fast_config(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(BridgeError::Config("bad source".to_string()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient(&BridgeError::Timeout("t".to_string())));
        assert!(is_transient(&BridgeError::upstream_http(503, "down")));
        assert!(is_transient(&BridgeError::Fetch(
            "failed to connect to host".to_string()
        )));
        assert!(!is_transient(&BridgeError::upstream_http(404, "missing")));
        assert!(!is_transient(&BridgeError::Fetch("YAML: bad indent".to_string())));
        assert!(!is_transient(&BridgeError::Config("nope".to_string())));
    }
}
