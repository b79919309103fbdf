//! Retry policy for throttled and timed-out transport calls

use std::time::Duration;

use rand::Rng;

/// Incremental backoff configuration. Applies only to transport-level
/// throttling (HTTP 429/503) and timeouts; nothing else is retried.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first one. 1 disables retries.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Fewer attempts, for production environments that prefer failing fast.
    pub fn conservative() -> Self {
        Self {
            max_attempts: 2,
            ..Self::default()
        }
    }

    /// More attempts with a shorter base delay, for bulk workloads.
    pub fn aggressive() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
            ..Self::default()
        }
    }

    /// No retries at all (for tests).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Whether the status code is worth retrying.
    pub fn is_retryable_status(status: u16) -> bool {
        matches!(status, 429 | 503)
    }

    /// Backoff delay before the given attempt (1-based; attempt 1 is the
    /// initial call and has no delay).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2) as i32;
        let factor = self.backoff_multiplier.powi(exponent);
        let delay = self.base_delay.mul_f64(factor).min(self.max_delay);
        if self.jitter && delay > Duration::ZERO {
            // Between 50% and 100% of the computed delay.
            let scale: f64 = rand::rng().random_range(0.5..=1.0);
            delay.mul_f64(scale)
        } else {
            delay
        }
    }
}
