use crate::error::*;
use std::time::Duration;
use tracing::{error, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn is_retryable(&self) -> bool;
    fn retry_after(&self) -> Option<Duration>;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::PlatformApi(e) => {
                error!("Platform API error details: {:?}", e);
            }
            CoreError::Database(e) => {
                error!("Database error details: {:?}", e);
            }
            CoreError::Graph(e) => {
                error!("Graph error details: {:?}", e);
            }
            CoreError::Export(e) => {
                error!("Export error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::PlatformApi(e) => e.is_retryable(),
            CoreError::Database(e) => matches!(e, DatabaseError::ConnectionFailed { .. }),
            CoreError::Network(_) => true,
            CoreError::Timeout { .. } => true,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::Timeout { seconds } => Some(Duration::from_secs(*seconds)),
            _ if self.is_retryable() => Some(Duration::from_secs(5)),
            _ => None,
        }
    }
}

impl PlatformApiError {
    /// Transient errors are worth retrying, possibly on a different key.
    pub fn is_retryable(&self) -> bool {
        match self {
            PlatformApiError::ServerError { .. } => true,
            PlatformApiError::RequestTimeout => true,
            PlatformApiError::ErrorEnvelope { code, .. } => *code >= 500,
            // A different key from the pool may still have quota.
            PlatformApiError::QuotaExhausted { .. } => true,
            PlatformApiError::Forbidden { .. } => false,
            PlatformApiError::ChannelNotFound { .. } => false,
            PlatformApiError::VideoNotFound { .. } => false,
            PlatformApiError::CommentsDisabled { .. } => false,
            PlatformApiError::InvalidResponse { .. } => false,
            PlatformApiError::NoCredentials => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_errors_are_retryable() {
        let err = CoreError::PlatformApi(PlatformApiError::QuotaExhausted {
            key_suffix: "ab12".to_string(),
        });
        assert!(err.is_retryable());
        assert!(err.retry_after().is_some());
    }

    #[test]
    fn test_not_found_is_permanent() {
        let err = CoreError::PlatformApi(PlatformApiError::VideoNotFound {
            video_id: "v1".to_string(),
        });
        assert!(!err.is_retryable());
        assert!(err.retry_after().is_none());
    }

    #[test]
    fn test_timeout_retry_after() {
        let err = CoreError::Timeout { seconds: 30 };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
    }
}
