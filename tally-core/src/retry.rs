//! Retry policy for queued actions.
//!
//! Decides what the sync processor does with an action after a failed
//! attempt, and how long a scheduler should wait before retrying a cycle
//! that left failures behind.

use std::time::Duration;

/// Attempts before an always-failing action is evicted.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Why an action left the queue without being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictReason {
    /// Every allowed attempt failed.
    RetriesExhausted,
    /// The server rejected the action as one it will never accept.
    Rejected,
}

/// What to do with an action whose attempt just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Leave it in place for the next drain cycle.
    Retry,
    /// Remove it and report a terminal failure.
    Evict(EvictReason),
}

/// Retry ceiling and rejection handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed attempts after which an action is evicted.
    pub max_retries: u32,
    /// Evict on the first permanent rejection instead of spending the
    /// remaining attempts.
    pub evict_rejected: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            evict_rejected: true,
        }
    }
}

impl RetryPolicy {
    /// Decide after a failure.
    ///
    /// `retry_count` is the value *after* the increment for this failure,
    /// so with a ceiling of 5 the fifth failure evicts and a sixth attempt
    /// never happens.
    pub fn after_failure(&self, retry_count: u32, permanent: bool) -> FailureDisposition {
        if permanent && self.evict_rejected {
            FailureDisposition::Evict(EvictReason::Rejected)
        } else if retry_count >= self.max_retries {
            FailureDisposition::Evict(EvictReason::RetriesExhausted)
        } else {
            FailureDisposition::Retry
        }
    }
}

/// Delay before the next scheduled drain after `attempt` failing cycles.
///
/// Formula: min(max, base * 2^(attempt - 1)) + random(0..=delay/5)
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let delay = base.saturating_mul(1u32 << exponent).min(max);

    let jitter_cap = delay.as_millis() as u64 / 5;
    let jitter = if jitter_cap == 0 {
        0
    } else {
        random_u64() % (jitter_cap + 1)
    };

    delay + Duration::from_millis(jitter)
}

/// Random value for jitter. Falls back to no jitter if the OS source fails.
fn random_u64() -> u64 {
    let mut bytes = [0u8; 8];
    match getrandom::getrandom(&mut bytes) {
        Ok(()) => u64::from_le_bytes(bytes),
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ceiling_is_five() {
        assert_eq!(RetryPolicy::default().max_retries, 5);
    }

    #[test]
    fn failures_below_ceiling_are_retried() {
        let policy = RetryPolicy::default();
        for count in 1..5 {
            assert_eq!(policy.after_failure(count, false), FailureDisposition::Retry);
        }
    }

    #[test]
    fn fifth_failure_evicts() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.after_failure(5, false),
            FailureDisposition::Evict(EvictReason::RetriesExhausted)
        );
    }

    #[test]
    fn ceiling_is_configurable() {
        let policy = RetryPolicy {
            max_retries: 2,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.after_failure(1, false), FailureDisposition::Retry);
        assert_eq!(
            policy.after_failure(2, false),
            FailureDisposition::Evict(EvictReason::RetriesExhausted)
        );
    }

    #[test]
    fn rejection_evicts_immediately_by_default() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.after_failure(1, true),
            FailureDisposition::Evict(EvictReason::Rejected)
        );
    }

    #[test]
    fn rejection_can_spend_the_budget_instead() {
        let policy = RetryPolicy {
            evict_rejected: false,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.after_failure(1, true), FailureDisposition::Retry);
        assert_eq!(
            policy.after_failure(5, true),
            FailureDisposition::Evict(EvictReason::RetriesExhausted)
        );
    }

    #[test]
    fn backoff_increases_with_attempt() {
        let base = Duration::from_secs(2);
        let max = Duration::from_secs(300);

        let delay1 = backoff_delay(1, base, max);
        let delay3 = backoff_delay(3, base, max);

        assert!(delay1 >= Duration::from_secs(2));
        assert!(delay1 <= Duration::from_millis(2400));
        assert!(delay3 >= Duration::from_secs(8));
    }

    #[test]
    fn backoff_is_capped() {
        let delay = backoff_delay(40, Duration::from_secs(2), Duration::from_secs(300));
        assert!(delay >= Duration::from_secs(300));
        assert!(delay <= Duration::from_secs(360));
    }

    #[test]
    fn backoff_attempt_zero_uses_base() {
        let delay = backoff_delay(0, Duration::from_secs(1), Duration::from_secs(10));
        assert!(delay >= Duration::from_secs(1));
        assert!(delay <= Duration::from_millis(1200));
    }
}
