use std::time::Duration;

use crate::error::HarnessError;

/// Bounded reattempt rule for transport-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first try and is clamped to at least one.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Only transport failures are retried. Status codes, timeouts and
    /// malformed requests are final.
    pub fn should_retry(&self, attempt: u32, error: &HarnessError) -> bool {
        attempt < self.max_attempts && error.is_network_failure()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}
