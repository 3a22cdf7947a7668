//! Bounded retry policy for optimistic-concurrency conflicts.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// How the delay grows between re-runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay before every re-run.
    Fixed,
    /// Doubles per attempt, capped at `max_delay`.
    #[default]
    Exponential,
    /// Grows by `base_delay` per attempt.
    Linear,
}

/// How many times a unit of work may be re-run after losing a commit race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Re-runs allowed after the first attempt; 0 disables retrying.
    pub max_attempts: u32,
    /// Delay before the first re-run.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
    /// Jitter factor (0.0-1.0); spreads racing writers apart
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(200),
            strategy: BackoffStrategy::Exponential,
            jitter: 0.5,
        }
    }
}

impl RetryPolicy {
    /// Fail on the first lost race.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            ..Default::default()
        }
    }

    /// Create a policy with fixed delays.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
            jitter: 0.0,
        }
    }

    /// Create a policy with exponential backoff.
    pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            strategy: BackoffStrategy::Exponential,
            jitter: 0.5,
        }
    }

    /// Delay before retry number `attempt` (1-indexed), without jitter.
    pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let delay = match self.strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Exponential => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
            BackoffStrategy::Linear => self.base_delay.saturating_mul(attempt),
        };
        delay.min(self.max_delay)
    }

    /// Delay before retry number `attempt` (1-indexed), with random jitter applied.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay_for_attempt(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if base.is_zero() || jitter == 0.0 {
            return base;
        }
        let factor = rand::thread_rng().gen_range((1.0 - jitter)..=(1.0 + jitter));
        base.mul_f64(factor)
    }

    /// Check if more retries are allowed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_doubles_until_capped() {
        let policy = RetryPolicy::exponential(10, Duration::from_millis(5), Duration::from_millis(30));
        assert_eq!(policy.base_delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.base_delay_for_attempt(1), Duration::from_millis(5));
        assert_eq!(policy.base_delay_for_attempt(2), Duration::from_millis(10));
        assert_eq!(policy.base_delay_for_attempt(3), Duration::from_millis(20));
        assert_eq!(policy.base_delay_for_attempt(4), Duration::from_millis(30));
        assert_eq!(policy.base_delay_for_attempt(40), Duration::from_millis(30));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy::default();
        for attempt in 1..=5 {
            let base = policy.base_delay_for_attempt(attempt);
            let delay = policy.delay_for_attempt(attempt);
            assert!(delay >= base.mul_f64(0.5));
            assert!(delay <= base.mul_f64(1.5));
        }
    }

    #[test]
    fn fixed_policy_has_no_jitter() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(7));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(7));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!RetryPolicy::no_retry().should_retry(0));
    }

    #[test]
    fn linear_grows_by_base_delay() {
        let policy = RetryPolicy {
            strategy: BackoffStrategy::Linear,
            jitter: 0.0,
            ..RetryPolicy::exponential(5, Duration::from_millis(4), Duration::from_millis(10))
        };
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(8));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(10));
    }
}
