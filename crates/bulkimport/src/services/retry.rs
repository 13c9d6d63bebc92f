//! Retry policy for transient write failures

use bulkimport_types::{ImportError, WriteError};
use std::time::Duration;

/// Exponential backoff bounded by a maximum delay and an attempt budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Decide what follows a failed attempt: a delay before trying again, or
    /// the error to record for the item.
    pub fn on_failure(&self, attempt: u32, error: WriteError) -> Result<Duration, ImportError> {
        if !error.is_transient() {
            return Err(ImportError::Write(error));
        }
        if attempt >= self.max_attempts {
            return Err(ImportError::RetriesExhausted {
                attempts: attempt,
                last: error,
            });
        }
        Ok(self.delay_for(attempt))
    }
}
