use crate::types::constants::{MAX_RECONNECT_ATTEMPTS, RECONNECT_BASE_DELAY, RECONNECT_MAX_DELAY};
use std::time::Duration;

/// Exponential reconnect backoff: attempt `n` waits `min(base * 2^n, cap)`.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    attempts: u32,
    base: Duration,
    cap: Duration,
    max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            base,
            cap,
            max_attempts,
        }
    }

    /// Delay for the zero-based attempt `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Claim the next attempt and return its delay, or `None` once the
    /// ceiling is reached. The counter moves before the caller sleeps.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        let delay = self.delay_for(self.attempts);
        self.attempts += 1;
        Some(delay)
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Reset the counter
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(RECONNECT_BASE_DELAY),
            Duration::from_millis(RECONNECT_MAX_DELAY),
            MAX_RECONNECT_ATTEMPTS,
        )
    }
}
