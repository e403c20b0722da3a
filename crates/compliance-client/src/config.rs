//! Client configuration types.

use rand::Rng;
use std::time::Duration;

/// Retry configuration for report delivery
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Backoff before the second attempt; doubles afterwards
    pub initial_backoff: Duration,

    /// Maximum backoff duration
    pub max_backoff: Duration,

    /// Jitter as a fraction of the backoff, in `[0, 1]`
    pub jitter: f64,

    /// Ceiling on the whole delivery, attempts and waits included
    pub deadline: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryConfig {
    /// Create a new retry configuration
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            jitter: 0.2,
            deadline: Duration::from_secs(180),
        }
    }

    /// Set maximum attempts (at least one attempt is always made)
    #[must_use]
    pub const fn max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = if max == 0 { 1 } else { max };
        self
    }

    /// Set initial backoff duration
    #[must_use]
    pub const fn initial_backoff(mut self, duration: Duration) -> Self {
        self.initial_backoff = duration;
        self
    }

    /// Set maximum backoff duration
    #[must_use]
    pub const fn max_backoff(mut self, duration: Duration) -> Self {
        self.max_backoff = duration;
        self
    }

    /// Set the jitter fraction
    #[must_use]
    pub fn jitter(mut self, fraction: f64) -> Self {
        self.jitter = jitter_fraction(fraction);
        self
    }

    /// Set the overall delivery ceiling
    #[must_use]
    pub const fn deadline(mut self, duration: Duration) -> Self {
        self.deadline = duration;
        self
    }

    /// Backoff after the given failed attempt (1-based), without jitter
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let base = u64::try_from(self.initial_backoff.as_millis()).unwrap_or(u64::MAX);
        let backoff = base.saturating_mul(2u64.pow(exponent));
        let max = u64::try_from(self.max_backoff.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(backoff.min(max))
    }

    /// Backoff after the given failed attempt with random jitter added
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = self.backoff_for(attempt);
        let spread = backoff.mul_f64(jitter_fraction(self.jitter));
        if spread.is_zero() {
            return backoff;
        }
        let extra = rand::thread_rng().gen_range(Duration::ZERO..spread);
        backoff + extra
    }
}

/// Clamp to `0.0..=1.0`; NaN and infinities disable jitter.
fn jitter_fraction(fraction: f64) -> f64 {
    if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
