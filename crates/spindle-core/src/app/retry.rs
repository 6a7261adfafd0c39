//! Retry policy: backoff delay between attempts of a failed step.

use std::time::Duration;

/// Exponential backoff: `base_delay * multiplier^(retry - 1)`, optionally
/// capped at `max_delay`.
///
/// With the defaults (2s, x2.0) a step that fails three times waits
/// 2s, 4s, then 8s.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_delay: None,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt that follows retry number `retry_count`
    /// (1-indexed; 0 is treated as 1).
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let exponent = retry_count.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::first(1, 2)]
    #[case::second(2, 4)]
    #[case::third(3, 8)]
    #[case::zero_is_first(0, 2)]
    fn default_policy_doubles(#[case] retry: u32, #[case] secs: u64) {
        assert_eq!(RetryPolicy::default().delay_for(retry), Duration::from_secs(secs));
    }

    #[test]
    fn max_delay_caps_growth() {
        let policy = RetryPolicy {
            max_delay: Some(Duration::from_secs(5)),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(5));
        assert_eq!(policy.delay_for(60), Duration::from_secs(5));
    }

    #[test]
    fn huge_exponent_saturates() {
        assert_eq!(RetryPolicy::default().delay_for(u32::MAX), Duration::MAX);
    }
}
