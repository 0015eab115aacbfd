use std::time::Duration;

/// Small helper to keep retry timing isolated. Doubles the delay on each
/// consecutive failure, capped, and resets on success.
#[derive(Debug, PartialEq)]
pub struct RetryBackoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl RetryBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempt: 0,
        }
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Delay before the next retry, advancing the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let exp = self.attempt.min(16);
        let delay = self
            .base
            .saturating_mul(1u32.checked_shl(exp).unwrap_or(u32::MAX))
            .min(self.max);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }
}
