//! Retry logic utilities for RPC operations
//!
//! This module provides helper functions for implementing exponential backoff
//! retry logic and timeout wrappers for blocking RPC client operations.

use crate::config::BitcoinRpcConfig;
use crate::errors::{RpcError, RpcResult};
use std::time::Duration;
use tokio::task::JoinError;
use tokio::time::error::Elapsed;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, warn};

/// Bounded retry with exponential backoff applied to every fetch
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: usize,
    /// Per-attempt timeout
    pub timeout: Duration,
    pub initial_backoff: Duration,
    pub backoff_multiplier: f64,
    pub max_backoff_seconds: u64,
}

impl From<&BitcoinRpcConfig> for RetryPolicy {
    fn from(config: &BitcoinRpcConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            timeout: Duration::from_secs(config.timeout_seconds),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            backoff_multiplier: config.backoff_multiplier,
            max_backoff_seconds: config.max_backoff_seconds,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&BitcoinRpcConfig::default())
    }
}

/// Calculate next backoff duration using exponential backoff with a maximum cap
///
/// `new_backoff = min(current_backoff * multiplier, max_backoff)`
///
/// # Example
/// ```
/// use std::time::Duration;
/// use block_fee_analyser::rpc::calculate_next_backoff;
///
/// let backoff = Duration::from_millis(100);
/// let next = calculate_next_backoff(backoff, 2.0, 30);
/// assert_eq!(next, Duration::from_millis(200));
/// ```
pub fn calculate_next_backoff(
    current_backoff: Duration,
    multiplier: f64,
    max_backoff_seconds: u64,
) -> Duration {
    Duration::from_millis((current_backoff.as_millis() as f64 * multiplier) as u64)
        .min(Duration::from_secs(max_backoff_seconds))
}

/// Execute a blocking RPC operation with timeout wrapper
///
/// # Returns
/// `Result<Result<RpcResult<T>, JoinError>, Elapsed>`
/// - Outer Result: Timeout result (Err = timeout elapsed)
/// - Middle Result: spawn_blocking result (Err = task panic/failure)
/// - Inner RpcResult<T>: RPC operation result
pub async fn execute_with_timeout<T, F>(
    limit: Duration,
    operation: F,
) -> Result<Result<RpcResult<T>, JoinError>, Elapsed>
where
    T: Send + 'static,
    F: FnOnce() -> RpcResult<T> + Send + 'static,
{
    timeout(limit, tokio::task::spawn_blocking(operation)).await
}

/// Run a blocking RPC call under `policy`.
///
/// Retryable failures (connection, call, timeout) back off and try again until
/// the attempt budget is spent; everything else is returned on first sight.
pub async fn call_with_retry<T, F>(policy: &RetryPolicy, operation: &str, call: F) -> RpcResult<T>
where
    T: Send + 'static,
    F: Fn() -> RpcResult<T> + Clone + Send + 'static,
{
    let mut attempts = 0;
    let mut backoff = policy.initial_backoff;

    loop {
        attempts += 1;

        let failure = match execute_with_timeout(policy.timeout, call.clone()).await {
            Ok(Ok(Ok(value))) => {
                if attempts > 1 {
                    debug!("{} succeeded after {} attempts", operation, attempts);
                }
                return Ok(value);
            }
            Ok(Ok(Err(e))) => e,
            Ok(Err(e)) => {
                error!("Spawn blocking error for {}: {}", operation, e);
                return Err(RpcError::CallFailed {
                    method: "spawn_blocking".to_string(),
                    message: format!("Task execution error: {}", e),
                });
            }
            Err(_) => RpcError::Timeout {
                timeout_seconds: policy.timeout.as_secs(),
                operation: operation.to_string(),
            },
        };

        if !failure.is_retryable() {
            debug!("{} failed (non-retryable): {}", operation, failure);
            return Err(failure);
        }

        if attempts >= policy.max_attempts {
            error!(
                "{} failed after {} attempts: {}",
                operation, attempts, failure
            );
            return Err(RpcError::MaxRetriesExceeded {
                operation: operation.to_string(),
                last_error: failure.to_string(),
            });
        }

        warn!(
            "RPC attempt {} failed for {}, retrying in {:?}: {}",
            attempts, operation, backoff, failure
        );
        sleep(backoff).await;

        backoff = calculate_next_backoff(
            backoff,
            policy.backoff_multiplier,
            policy.max_backoff_seconds,
        );
    }
}
