//! Retry policy for placement attempts.

use std::time::Duration;

/// Bounded retry policy.
///
/// A multiplier of 1.0 gives a fixed delay between attempts; anything
/// larger backs off exponentially up to `max_delay_ms`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including first try)
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,

    /// Backoff multiplier (delay *= multiplier after each retry)
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    /// Three attempts, two seconds apart
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(2))
    }
}

impl RetryPolicy {
    /// Fixed delay between a bounded number of attempts
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        let delay_ms = delay.as_millis() as u64;
        Self {
            max_attempts,
            initial_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            backoff_multiplier: 1.0,
        }
    }

    /// Calculate delay after a failed attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::from_millis(self.initial_delay_ms.min(self.max_delay_ms));
        }

        let delay = self.initial_delay_ms as f64
            * self.backoff_multiplier.powi((attempt - 1) as i32);

        let capped = delay.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(capped)
    }

    /// Check if we should retry based on attempt count
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
