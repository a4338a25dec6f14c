//! Retry logic with exponential backoff
//!
//! Used for the artifact download stage only. Submission and status checks are
//! never retried automatically.
//!
//! # Example
//!
//! ```no_run
//! use vidgen::retry::{IsRetryable, download_with_retry};
//! use vidgen::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), vidgen::retry::RetryFailure<MyError>> {
//! let config = RetryConfig::default();
//! download_with_retry(&config, || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{DownloadError, Error};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
pub trait IsRetryable {
    /// Returns true if the operation should be attempted again
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Every transport failure during a download attempt is retried
            Error::Network(_) | Error::Io(_) => true,
            // Integrity failures are retried like transport failures
            Error::Download(DownloadError::Exhausted { .. }) => false,
            Error::Download(_) => true,
            Error::Config { .. }
            | Error::Submit(_)
            | Error::Generation(_)
            | Error::ReferenceImage(_)
            | Error::Prompt(_)
            | Error::InvalidJobId(_)
            | Error::JobNotFound { .. }
            | Error::Serialization(_) => false,
        }
    }
}

/// Final error of a retried operation
#[derive(Debug)]
pub struct RetryFailure<E> {
    /// Error returned by the last attempt
    pub error: E,
    /// Number of attempts performed
    pub attempts: u32,
}

impl<E: std::fmt::Display> std::fmt::Display for RetryFailure<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (after {} attempts)", self.error, self.attempts)
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for RetryFailure<E> {}

/// Delay slept after the failed attempt with 0-based index `attempt`
///
/// `initial_delay * backoff_multiplier^attempt`, capped at `max_delay`, no jitter.
pub fn delay_for_attempt(config: &RetryConfig, attempt: u32) -> Duration {
    let factor = config.backoff_multiplier.powi(attempt as i32);
    let secs = config.initial_delay.as_secs_f64() * factor;
    Duration::from_secs_f64(secs.min(config.max_delay.as_secs_f64()))
}

/// Execute an async operation with exponential backoff retry logic
///
/// The operation runs at most `config.max_attempts` times. After a retryable failure
/// of attempt `k` (0-based) it sleeps [`delay_for_attempt`]`(k)` before trying
/// again; there is no sleep before the first attempt or after the last one.
pub async fn download_with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                let delay = delay_for_attempt(config, attempt);
                let delay = if config.jitter { add_jitter(delay) } else { delay };
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis(),
                    "operation failed, retrying"
                );

                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "operation failed with non-retryable error");
                }
                return Err(RetryFailure {
                    error: e,
                    attempts: attempt + 1,
                });
            }
        }
    }
}

/// Add random jitter to a delay
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
