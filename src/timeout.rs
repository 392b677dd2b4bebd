//! Timeout utilities for bounding reference-digest retrieval.
//!
//! A fetch that never completes would otherwise stall the whole check
//! indefinitely; the engine wraps retrieval in `with_timeout`.

use crate::error::{Result, SealError};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error};

/// Default bound on reference retrieval, in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Timeout configuration for an async operation.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Maximum duration for the operation
    pub duration: Duration,
    /// Whether to log timeout errors
    pub log_errors: bool,
    /// Operation name for logging
    pub operation_name: String,
}

impl TimeoutConfig {
    /// Create a new timeout configuration
    pub fn new(seconds: u64, operation: impl Into<String>) -> Self {
        Self {
            duration: Duration::from_secs(seconds),
            log_errors: true,
            operation_name: operation.into(),
        }
    }

    /// Create a configuration with the default fetch bound.
    pub fn default_fetch(operation: impl Into<String>) -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT_SECONDS, operation)
    }
}

/// Execute an async operation with a timeout
pub async fn with_timeout<T, F>(config: TimeoutConfig, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    debug!(
        "Starting operation '{}' with timeout of {}s",
        config.operation_name,
        config.duration.as_secs()
    );

    match timeout(config.duration, future).await {
        Ok(result) => {
            debug!(
                "Operation '{}' completed within bound",
                config.operation_name
            );
            result
        }
        Err(_) => {
            if config.log_errors {
                error!(
                    "Operation '{}' timed out after {}s",
                    config.operation_name,
                    config.duration.as_secs()
                );
            }

            Err(SealError::Timeout {
                seconds: config.duration.as_secs(),
            })
        }
    }
}
