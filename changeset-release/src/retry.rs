use backoff::future::retry;
use backoff::ExponentialBackoff;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{ReleaseError, Result};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub max_elapsed_time: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            max_elapsed_time: Some(Duration::from_secs(60)),
        }
    }
}

impl RetryConfig {
    pub fn to_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            max_elapsed_time: self.max_elapsed_time,
            ..Default::default()
        }
    }
}

/// Execute an idempotent async operation, retrying transient failures
pub async fn with_retry<F, Fut, T>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let backoff = config.to_backoff();
    let mut attempt = 0;

    retry(backoff, || {
        attempt += 1;
        let op = operation();

        async move {
            match op.await {
                Ok(result) => {
                    if attempt > 1 {
                        info!("{} succeeded on attempt {}", operation_name, attempt);
                    }
                    Ok(result)
                }
                Err(e) if !is_retryable_error(&e) => Err(backoff::Error::permanent(e)),
                Err(e) if attempt <= config.max_retries => {
                    warn!(
                        "{} failed on attempt {} of {}: {}. Retrying...",
                        operation_name, attempt, config.max_retries, e
                    );
                    Err(backoff::Error::transient(e))
                }
                Err(e) => {
                    warn!(
                        "{} failed after {} attempts: {}",
                        operation_name, attempt, e
                    );
                    Err(backoff::Error::permanent(e))
                }
            }
        }
    })
    .await
}

/// Server-side and transport failures are retried; client errors are not
pub fn is_retryable_error(error: &ReleaseError) -> bool {
    match error {
        ReleaseError::GitHubApi(err) => match err.as_ref() {
            octocrab::Error::GitHub { source, .. } => {
                let status = source.status_code.as_u16();
                status >= 500 || status == 429
            }
            octocrab::Error::Hyper { .. } | octocrab::Error::Service { .. } => true,
            _ => false,
        },
        ReleaseError::Io(io_err) => {
            use std::io::ErrorKind;
            matches!(
                io_err.kind(),
                ErrorKind::ConnectionAborted
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionRefused
                    | ErrorKind::TimedOut
                    | ErrorKind::Interrupted
                    | ErrorKind::UnexpectedEof
            )
        }
        _ => false,
    }
}
