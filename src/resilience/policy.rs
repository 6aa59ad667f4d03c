use std::time::Duration;
use serde::{Deserialize, Serialize};

/// How a failed sensor start is retried by its supervising task.
///
/// Retries are bounded so a start attempt always has a finite worst case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// One attempt only
    Never,

    /// Same pause before every retry
    Fixed { delay_ms: u64, max_attempts: usize },

    /// Doubling pause capped at `max_ms`
    Exponential {
        base_ms: u64,
        max_ms: u64,
        max_attempts: usize,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Never
    }
}

impl RetryPolicy {
    /// Pause before retry number `retry` (1-based), or `None` once exhausted.
    pub fn delay_for(&self, retry: usize) -> Option<Duration> {
        if retry == 0 || retry > self.max_retries() {
            return None;
        }
        match self {
            RetryPolicy::Never => None,
            RetryPolicy::Fixed { delay_ms, .. } => Some(Duration::from_millis(*delay_ms)),
            RetryPolicy::Exponential { base_ms, max_ms, .. } => {
                let shift = (retry - 1).min(32) as u32;
                let delay = base_ms.saturating_mul(1u64 << shift).min(*max_ms);
                Some(Duration::from_millis(delay))
            }
        }
    }

    pub fn max_retries(&self) -> usize {
        match self {
            RetryPolicy::Never => 0,
            RetryPolicy::Fixed { max_attempts, .. } => *max_attempts,
            RetryPolicy::Exponential { max_attempts, .. } => *max_attempts,
        }
    }

    /// Sum of every pause the policy can introduce.
    pub fn total_delay(&self) -> Duration {
        (1..=self.max_retries()).filter_map(|r| self.delay_for(r)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_has_no_retries() {
        let policy = RetryPolicy::Never;
        assert_eq!(policy.max_retries(), 0);
        assert_eq!(policy.delay_for(1), None);
        assert_eq!(policy.total_delay(), Duration::ZERO);
    }

    #[test]
    fn test_exponential_is_capped() {
        let policy = RetryPolicy::Exponential { base_ms: 100, max_ms: 350, max_attempts: 4 };
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_millis(350)));
        assert_eq!(policy.delay_for(5), None);
        assert_eq!(policy.total_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn test_policy_from_json() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"strategy":"fixed","delay_ms":50,"max_attempts":2}"#).unwrap();
        assert_eq!(policy, RetryPolicy::Fixed { delay_ms: 50, max_attempts: 2 });
    }
}
