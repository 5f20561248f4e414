//! Retry policy for per-item remote operations

use std::time::Duration;

use crate::error::SyncError;

/// Which failures are retried, how often, and how long to wait in between
///
/// Attempts are counted from 1; `max_attempts` includes the first one.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per item
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Upper bound for any delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
    /// Also retry optimistic-concurrency conflicts
    pub retry_conflicts: bool,
    /// HTTP statuses retried in addition to the transient ones
    pub retry_status_codes: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            retry_conflicts: false,
            retry_status_codes: Vec::new(),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, nothing retried
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Whether the error is worth another attempt under this policy
    #[must_use]
    pub fn is_retryable(&self, err: &SyncError) -> bool {
        if err.is_retryable() {
            return true;
        }
        if self.retry_conflicts && err.is_conflict() {
            return true;
        }
        match err {
            SyncError::Transport {
                status: Some(status),
                ..
            }
            | SyncError::Conflict { status, .. } => self.retry_status_codes.contains(status),
            _ => false,
        }
    }

    /// Whether an item that failed on `attempt` gets another one
    #[must_use]
    pub fn should_retry(&self, err: &SyncError, attempt: u32) -> bool {
        attempt < self.max_attempts && self.is_retryable(err)
    }

    /// Delay before retrying an item that failed on `attempt`
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !base.is_finite() || base < 0.0 || base >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conflict() -> SyncError {
        SyncError::Conflict {
            status: 409,
            name: "home".into(),
            message: "stale rev".into(),
        }
    }

    #[test]
    fn test_default_retries_transient_errors() {
        let policy = RetryPolicy::default();
        let unavailable = SyncError::transport(Some(503), "unavailable");

        assert!(policy.should_retry(&unavailable, 1));
        assert!(policy.should_retry(&unavailable, 2));
        assert!(!policy.should_retry(&unavailable, 3));
        assert!(!policy.should_retry(&SyncError::transport(Some(400), "bad"), 1));
        assert!(!policy.should_retry(&conflict(), 1));
    }

    #[test]
    fn test_none_never_retries() {
        let policy = RetryPolicy::none();
        assert!(!policy.should_retry(&SyncError::transport(None, "reset"), 1));
    }

    #[test]
    fn test_opt_in_conflicts_and_status_codes() {
        let policy = RetryPolicy {
            retry_conflicts: true,
            retry_status_codes: vec![408],
            ..RetryPolicy::default()
        };
        assert!(policy.is_retryable(&conflict()));
        assert!(policy.is_retryable(&SyncError::transport(Some(408), "timeout")));
        assert!(!policy.is_retryable(&SyncError::not_found("types", "x")));
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for_attempt(30), Duration::from_millis(350));
    }
}
