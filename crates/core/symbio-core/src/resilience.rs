//! Retry logic for the inference boundary

use crate::{Result, SymbioError};
use std::time::Duration;
use tracing::{error, warn};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries
    pub max_retries: usize,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// Execute a function with exponential-backoff retry
pub async fn retry_with_backoff<F, T, E>(config: RetryConfig, mut f: F) -> Result<T>
where
    F: FnMut() -> std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<T, E>> + Send>,
    >,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;

                if attempt > config.max_retries {
                    error!("All {} retry attempts failed", config.max_retries);
                    return Err(SymbioError::inference(format!(
                        "Retry failed after {} attempts: {}",
                        config.max_retries, e
                    )));
                }

                warn!("Attempt {} failed: {}. Retrying in {:?}", attempt, e, delay);
                tokio::time::sleep(delay).await;

                delay = Duration::from_millis(
                    ((delay.as_millis() as f64) * config.multiplier)
                        .min(config.max_delay.as_millis() as f64) as u64,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let mut attempts = 0;
        let result = retry_with_backoff(fast_config(), || {
            attempts += 1;
            Box::pin(async move {
                if attempts < 3 {
                    Err("not yet")
                } else {
                    Ok(42)
                }
            })
        })
        .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retry_exhaustion() {
        let config = RetryConfig {
            max_retries: 2,
            ..fast_config()
        };
        let result =
            retry_with_backoff(config, || Box::pin(async { Err::<(), _>("always fails") })).await;

        assert!(matches!(result, Err(SymbioError::Inference(_))));
    }
}
