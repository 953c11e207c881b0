use std::time::Duration;

use rand::Rng;

/// Bounded retry budget for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: u8,
    pub base_ms: u64,
    pub max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_ms: 25,
            max_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt is allowed after `attempt` (1-based) failed.
    pub fn should_retry(&self, attempt: u8) -> bool {
        attempt <= self.max_retries
    }

    /// Delay before the attempt that follows failed attempt `attempt`.
    pub fn backoff(&self, attempt: u8) -> Duration {
        calculate_backoff(attempt, self.base_ms, self.max_ms)
    }
}

/// Calculate exponential backoff delay with jitter.
///
/// Formula: `min(base_ms * 2^(attempt-1) + jitter, max_ms)` (0-25% jitter)
pub fn calculate_backoff(attempt: u8, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exp_factor = 2u64.saturating_pow((attempt - 1) as u32);
    let delay_ms = base_ms.saturating_mul(exp_factor);

    let jitter = if delay_ms > 0 {
        rand::rng().random_range(0..=delay_ms / 4)
    } else {
        0
    };

    let total_delay = delay_ms.saturating_add(jitter).min(max_ms);
    Duration::from_millis(total_delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_backoff_basic() {
        let d1 = calculate_backoff(1, 1000, 60000);
        assert!(d1.as_millis() >= 1000 && d1.as_millis() <= 1250);

        let d2 = calculate_backoff(2, 1000, 60000);
        assert!(d2.as_millis() >= 2000 && d2.as_millis() <= 2500);

        let d3 = calculate_backoff(3, 1000, 60000);
        assert!(d3.as_millis() >= 4000 && d3.as_millis() <= 5000);
    }

    #[test]
    fn test_calculate_backoff_respects_max() {
        let d = calculate_backoff(10, 10000, 60000);
        assert!(d.as_millis() <= 60000);
    }

    #[test]
    fn test_calculate_backoff_zero_attempt() {
        assert_eq!(calculate_backoff(0, 1000, 60000), Duration::ZERO);
    }

    #[test]
    fn policy_allows_exactly_max_retries() {
        let policy = RetryPolicy {
            max_retries: 2,
            ..Default::default()
        };
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn zero_retries_never_retries() {
        let policy = RetryPolicy {
            max_retries: 0,
            ..Default::default()
        };
        assert!(!policy.should_retry(1));
    }

    #[test]
    fn policy_backoff_is_capped() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_ms: 500,
            max_ms: 800,
        };
        assert!(policy.backoff(8) <= Duration::from_millis(800));
    }
}
