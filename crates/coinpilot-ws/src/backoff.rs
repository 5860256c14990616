//! Reconnect policy: bounded linear backoff, no jitter.

use std::time::Duration;

/// Default base delay between attempts.
pub const DEFAULT_BASE_DELAY_MS: u64 = 2000;
/// Default number of reconnect attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Linear backoff: attempt `n` waits `base * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    /// Delay before attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Next attempt after `current` consecutive failures.
    ///
    /// Returns the incremented counter and its delay, or `None` once the
    /// bound is exhausted.
    pub fn next_attempt(&self, current: u32) -> Option<(u32, Duration)> {
        if current >= self.max_attempts {
            return None;
        }
        let attempt = current + 1;
        Some((attempt, self.delay_for(attempt)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule_is_linear() {
        let policy = ReconnectPolicy::default();
        let mut attempts = 0;
        let mut delays = Vec::new();
        while let Some((next, delay)) = policy.next_attempt(attempts) {
            attempts = next;
            delays.push(delay.as_millis() as u64);
        }
        assert_eq!(delays, vec![2000, 4000, 6000, 8000, 10000]);
        assert_eq!(attempts, 5);
    }

    #[test]
    fn test_exhausted_bound() {
        let policy = ReconnectPolicy::new(Duration::from_millis(100), 2);
        assert!(policy.next_attempt(2).is_none());
        assert!(policy.next_attempt(u32::MAX).is_none());
    }

    #[test]
    fn test_zero_attempts_never_reconnects() {
        let policy = ReconnectPolicy::new(Duration::from_millis(100), 0);
        assert!(policy.next_attempt(0).is_none());
    }
}
