//! Bounded retry for transactions that lose a serialization race.
//!
//! Only errors whose [`JournalError::is_retryable`] is true are retried.
//! Validation, not-found and infrastructure errors are returned on the
//! first failure.

use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::error::JournalError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. At least 1.
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(25),
            max_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based): base * 2^(retry-1), capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        self.base_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff)
    }
}

/// Runs `operation` until it succeeds, fails permanently, or the policy's
/// attempts are used up. Exhaustion yields [`JournalError::RetriesExhausted`].
pub fn with_retry<T, F>(policy: &RetryPolicy, mut operation: F) -> Result<T, JournalError>
where
    F: FnMut() -> Result<T, JournalError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation() {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempts = attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                if attempt >= max_attempts {
                    warn!(attempts = attempt, error = %e, "retries exhausted");
                    return Err(JournalError::RetriesExhausted {
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
                let delay = policy.backoff(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transaction conflict, retrying"
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}
