//! Configuration types and structures

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::patterns::PatternMatcher;
use crate::sync::{DEFAULT_CONCURRENCY, RetryPolicy};

/// Default HTTP request timeout
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// `[retry]` table
///
/// Unset fields fall back to [`RetryPolicy::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RetrySettings {
    /// Total attempts per item, including the first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    /// Delay before the first retry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_delay_ms: Option<u64>,

    /// Upper bound for the delay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,

    /// Backoff multiplier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,

    /// Retry optimistic-concurrency conflicts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_conflicts: Option<bool>,

    /// Extra HTTP statuses to treat as transient
    #[serde(default)]
    pub retry_status_codes: Vec<u16>,
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Base URL of the content hub
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// User name for basic authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Maximum in-flight requests per batch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// Treat a create conflict as success when pushing with force override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_ignored_with_force_override: Option<bool>,

    /// Patterns of local files to ignore
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Patterns to explicitly include (override ignores)
    #[serde(default)]
    pub include: Vec<String>,

    /// Retry policy
    #[serde(default)]
    pub retry: RetrySettings,
}

impl Config {
    /// Effective concurrency limit
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or(DEFAULT_CONCURRENCY)
    }

    /// Effective request timeout
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Effective conflict-as-success setting under force override
    #[must_use]
    pub fn conflict_ignored_with_force_override(&self) -> bool {
        self.conflict_ignored_with_force_override.unwrap_or(true)
    }

    /// Build the matcher for local artifact files
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is invalid.
    pub fn pattern_matcher(&self) -> anyhow::Result<PatternMatcher> {
        PatternMatcher::with_patterns(&self.ignore, &self.include)
    }

    /// Build the retry policy from the `[retry]` table
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        let settings = &self.retry;
        RetryPolicy {
            max_attempts: settings.max_attempts.unwrap_or(defaults.max_attempts),
            initial_delay: settings
                .initial_delay_ms
                .map_or(defaults.initial_delay, Duration::from_millis),
            max_delay: settings
                .max_delay_ms
                .map_or(defaults.max_delay, Duration::from_millis),
            multiplier: settings.multiplier.unwrap_or(defaults.multiplier),
            retry_conflicts: settings.retry_conflicts.unwrap_or(defaults.retry_conflicts),
            retry_status_codes: settings.retry_status_codes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.ignore.is_empty());
        assert!(config.include.is_empty());
        assert_eq!(config.concurrency(), DEFAULT_CONCURRENCY);
        assert!(config.conflict_ignored_with_force_override());
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_retry_policy_from_settings() {
        let config: Config = toml::from_str(
            r#"
[retry]
max_attempts = 5
initial_delay_ms = 10
retry_conflicts = true
retry_status_codes = [408]
"#,
        )
        .unwrap();

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(10));
        assert_eq!(policy.max_delay, RetryPolicy::default().max_delay);
        assert!(policy.retry_conflicts);
        assert_eq!(policy.retry_status_codes, vec![408]);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config {
            api_url: Some("https://hub.example.com".to_string()),
            concurrency: Some(4),
            ignore: vec!["*.bak".to_string()],
            ..Config::default()
        };

        let text = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
