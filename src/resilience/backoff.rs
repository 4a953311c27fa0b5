//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Exponential backoff schedule: `base_delay * factor^attempt`, capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay unit multiplied by the exponential term.
    pub base_delay: Duration,
    /// Exponential base (2 gives 2, 4, 8... units).
    pub factor: u32,
    /// Upper bound before jitter.
    pub max_delay: Duration,
}

impl Backoff {
    pub fn new(base_delay: Duration, factor: u32, max_delay: Duration) -> Self {
        Self {
            base_delay,
            factor,
            max_delay,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt, without jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let multiplier = self.factor.max(1).saturating_pow(attempt);
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let delay_ms = base_ms.saturating_mul(u64::from(multiplier));
        let max_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);

        Duration::from_millis(delay_ms.min(max_ms))
    }

    /// Delay for the given attempt with 0-10% jitter applied.
    pub fn jittered(&self, attempt: u32) -> Duration {
        let capped = self.delay_for(attempt);
        let capped_ms = u64::try_from(capped.as_millis()).unwrap_or(u64::MAX);

        let jitter_range = capped_ms / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped_ms.saturating_add(jitter))
    }
}
