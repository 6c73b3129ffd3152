//! Reconnect delay policy.
//!
//! The delay before reconnect number `n` (counting from 0) is
//! `min(base * 2^n + jitter, max_delay)` with jitter drawn uniformly from
//! `[0, max_jitter)`.

use std::time::Duration;

use rand::Rng;

/// Tunable parameters for the reconnect backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Reconnects allowed after consecutive failures before giving up.
    pub max_retries: u32,
    /// Delay before the first reconnect, without jitter.
    pub base_delay: Duration,
    /// Upper bound on any single delay, jitter included.
    pub max_delay: Duration,
    /// Exclusive upper bound of the random jitter.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(10_000),
            max_jitter: Duration::from_millis(1_000),
        }
    }
}

impl RetryPolicy {
    /// Delay before reconnect number `retry_count`, with the given jitter.
    pub fn delay_for(&self, retry_count: u32, jitter: Duration) -> Duration {
        let factor = 2u32.checked_pow(retry_count).unwrap_or(u32::MAX);
        self.base_delay
            .saturating_mul(factor)
            .saturating_add(jitter)
            .min(self.max_delay)
    }

    /// Draw a random jitter in `[0, max_jitter)`.
    pub fn jitter(&self) -> Duration {
        let bound = self.max_jitter.as_millis() as u64;
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..bound))
    }
}
