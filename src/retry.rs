//! Retry with exponential backoff for transient provider failures.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::provider::ProviderError;

/// Default maximum attempts per operation (1 initial try + 2 retries)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default backoff before the first retry
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

/// Default cap on backoff growth
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Controls how many times an operation is attempted and how long to wait
/// between attempts
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Backoff before the first retry
    pub initial_backoff: Duration,
    /// Ceiling on backoff growth
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries, for tests
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Exponential backoff for the retry following attempt number `attempt`
    /// (0-based): `initial * 2^attempt`, capped at `max_backoff`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt);
        let delay = self.initial_backoff.saturating_mul(multiplier);
        delay.min(self.max_backoff)
    }

    /// Whether another attempt should be made after `error` on 0-based
    /// attempt number `attempt`
    pub fn should_retry(&self, error: &ProviderError, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts && error.is_transient()
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts are
/// exhausted.
///
/// Only errors classified transient by [`ProviderError::is_transient`] are
/// retried; permanent errors (not found, forbidden, quota) return on the
/// first occurrence.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    op_name: &str,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(operation = op_name, attempt = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if policy.should_retry(&error, attempt) => {
                let delay = policy.backoff_delay(attempt);
                warn!(
                    operation = op_name,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient failure, backing off before retry"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
