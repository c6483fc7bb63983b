use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};
use tubegraph_core::{CoreError, PlatformApiError};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (first try included)
    pub max_attempts: u32,
    /// Base delay for exponential backoff (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Retry config tuned for the platform API. Quota errors get a longer
    /// base delay so a fresh key draw has time to matter.
    pub fn platform() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 2000,
            max_delay_ms: 60000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

/// Retry strategy based on error type
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Retry with exponential backoff
    Retry,
    /// Don't retry (for permanent failures)
    NoRetry,
}

/// Determine retry strategy based on error type
pub fn get_retry_strategy(error: &CoreError) -> RetryStrategy {
    match error {
        CoreError::PlatformApi(api_error) => match api_error {
            // A different key from the pool may still have quota
            PlatformApiError::QuotaExhausted { .. } => RetryStrategy::Retry,
            PlatformApiError::ServerError { .. } => RetryStrategy::Retry,
            PlatformApiError::RequestTimeout => RetryStrategy::Retry,
            PlatformApiError::ErrorEnvelope { code, .. } if *code >= 500 => RetryStrategy::Retry,
            PlatformApiError::ErrorEnvelope { .. } => RetryStrategy::NoRetry,
            // Permission and existence errors are permanent
            PlatformApiError::Forbidden { .. } => RetryStrategy::NoRetry,
            PlatformApiError::ChannelNotFound { .. } => RetryStrategy::NoRetry,
            PlatformApiError::VideoNotFound { .. } => RetryStrategy::NoRetry,
            PlatformApiError::CommentsDisabled { .. } => RetryStrategy::NoRetry,
            PlatformApiError::InvalidResponse { .. } => RetryStrategy::NoRetry,
            PlatformApiError::NoCredentials => RetryStrategy::NoRetry,
        },
        CoreError::Network(reqwest_error) => {
            if reqwest_error.is_timeout() || reqwest_error.is_connect() {
                RetryStrategy::Retry
            } else {
                RetryStrategy::NoRetry
            }
        }
        _ => RetryStrategy::NoRetry,
    }
}

/// Calculate delay with exponential backoff and jitter
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_delay = Duration::from_millis(config.base_delay_ms);
    let max_delay = Duration::from_millis(config.max_delay_ms);

    let exponential_delay = if attempt == 0 {
        base_delay
    } else {
        let multiplier = config.backoff_multiplier.powi(attempt as i32);
        let delay_ms = (config.base_delay_ms as f64 * multiplier) as u64;
        Duration::from_millis(delay_ms.min(config.max_delay_ms))
    };

    // Add jitter to prevent thundering herd
    let jitter_range = (exponential_delay.as_millis() as f64 * config.jitter_factor) as u64;
    let jitter = fastrand::u64(0..=jitter_range);
    let final_delay = exponential_delay + Duration::from_millis(jitter);

    final_delay.min(max_delay)
}

/// Retry executor that wraps operations with bounded retry logic. Replaces
/// the unbounded resubmit-on-error loop with a capped attempt count.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute an operation, retrying transient failures with backoff.
    pub async fn execute<F, Fut, T>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut last_error: Option<CoreError> = None;

        for attempt in 0..self.config.max_attempts {
            if attempt > 0 {
                debug!("Retry attempt {} for {}", attempt, operation_name);
            }

            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!("Operation {} succeeded after {} retries", operation_name, attempt);
                    }
                    return Ok(result);
                }
                Err(error) => {
                    let strategy = get_retry_strategy(&error);
                    let attempts_left = attempt + 1 < self.config.max_attempts;

                    match strategy {
                        RetryStrategy::Retry if attempts_left => {
                            let delay = calculate_delay(attempt, &self.config);
                            info!(
                                "Retrying {} in {:?} due to: {}",
                                operation_name, delay, error
                            );
                            last_error = Some(error);
                            sleep(delay).await;
                        }
                        _ => {
                            debug!("Not retrying {}: {}", operation_name, error);
                            last_error = Some(error);
                            break;
                        }
                    }
                }
            }
        }

        Err(last_error.unwrap_or(CoreError::Internal {
            message: format!("{} failed without an error", operation_name),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_delay_grows_with_attempts() {
        let config = RetryConfig {
            jitter_factor: 0.0,
            ..RetryConfig::default()
        };
        let d0 = calculate_delay(0, &config);
        let d1 = calculate_delay(1, &config);
        let d2 = calculate_delay(2, &config);
        assert!(d1 > d0);
        assert!(d2 > d1);
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = RetryConfig {
            base_delay_ms: 1000,
            max_delay_ms: 2000,
            backoff_multiplier: 10.0,
            jitter_factor: 0.0,
            max_attempts: 5,
        };
        assert_eq!(calculate_delay(4, &config), Duration::from_millis(2000));
    }

    #[test]
    fn test_permanent_error_not_retried() {
        let err = CoreError::PlatformApi(PlatformApiError::VideoNotFound {
            video_id: "v".to_string(),
        });
        assert_eq!(get_retry_strategy(&err), RetryStrategy::NoRetry);
    }

    #[tokio::test]
    async fn test_executor_retries_transient_errors() {
        let config = RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
            backoff_multiplier: 1.0,
            jitter_factor: 0.0,
        };
        let executor = RetryExecutor::new(config);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_ref = calls.clone();

        let result = executor
            .execute("test_op", || {
                let calls = calls_ref.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(CoreError::PlatformApi(PlatformApiError::ServerError {
                            status_code: 503,
                        }))
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
    async fn test_executor_stops_on_permanent_error() {
        let executor = RetryExecutor::new(RetryConfig::default());
        let calls = Arc::new(AtomicU32::new(0));
        let calls_ref = calls.clone();

        let result: Result<(), CoreError> = executor
            .execute("test_op", || {
                let calls = calls_ref.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(CoreError::PlatformApi(PlatformApiError::Forbidden {
                        resource: "x".to_string(),
                    }))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
