use std::time::Duration;

use rand::Rng;

/// Exponential backoff for transient errors. Non-transient errors bypass
/// retry entirely; callers re-run provider selection on every attempt so a
/// degraded provider can be swapped out mid-retry.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub factor: f64,
    pub max_attempts: u32,
    pub max_delay: Duration,
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            factor: 2.0,
            max_attempts: 3,
            max_delay: Duration::from_secs(60),
            jitter_ratio: 0.3,
        }
    }
}

impl RetryPolicy {
    /// Deterministic backoff for a 1-based attempt number, before jitter.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let delay = self.base_delay.as_secs_f64() * self.factor.powi(exp as i32);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    /// Backoff plus uniform jitter in `[0, jitter_ratio * backoff]`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = self.backoff_for(attempt);
        if self.jitter_ratio <= 0.0 {
            return backoff;
        }
        let jitter_max = backoff.as_secs_f64() * self.jitter_ratio;
        let jitter = rand::thread_rng().gen_range(0.0..=jitter_max);
        backoff + Duration::from_secs_f64(jitter)
    }

    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
