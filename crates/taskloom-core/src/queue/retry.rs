//! Retry policy: decides backoff delays.

use std::time::Duration;

/// Backoff applied on top of a definition's `retry_delay`.
///
/// delay = retry_delay * multiplier^(retries_used - 1), capped at `max_delay`
/// (or at `retry_delay` itself when that is larger).
/// With the default multiplier of 1.0 every retry waits exactly `retry_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Backoff multiplier for exponential backoff. Values below 1.0 act as 1.0.
    pub multiplier: f64,

    /// Upper bound for a single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    pub fn exponential(multiplier: f64, max_delay: Duration) -> Self {
        Self {
            multiplier,
            max_delay,
        }
    }

    /// Delay before the next attempt.
    ///
    /// # Arguments
    /// * `base` - the definition's `retry_delay`
    /// * `retries_used` - retries already granted including this one (1-indexed)
    ///
    /// Example with base=1s, multiplier=2.0:
    /// - retry 1: 1s
    /// - retry 2: 2s
    /// - retry 3: 4s
    pub fn next_delay(&self, base: Duration, retries_used: u32) -> Duration {
        let exponent = retries_used.saturating_sub(1).min(i32::MAX as u32) as i32;
        if exponent == 0 || self.multiplier <= 1.0 {
            return base;
        }
        let secs = base.as_secs_f64() * self.multiplier.powi(exponent);
        // the cap bounds growth only; a base above it is used as-is
        let cap = self.max_delay.max(base);
        Duration::try_from_secs_f64(secs.min(cap.as_secs_f64())).unwrap_or(cap)
    }
}
