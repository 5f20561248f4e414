//! Configuration validation and error reporting

use super::types::Config;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Create a new config validator
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validate a configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(config: &Config) -> anyhow::Result<()> {
        if let Some(url) = &config.api_url {
            Self::validate_url(url)?;
        }

        if config.concurrency == Some(0) {
            anyhow::bail!("concurrency must be at least 1");
        }

        if config.request_timeout_secs == Some(0) {
            anyhow::bail!("request_timeout_secs must be at least 1");
        }

        for pattern in &config.ignore {
            if pattern.trim().is_empty() {
                anyhow::bail!("Ignore pattern cannot be empty");
            }
        }

        for pattern in &config.include {
            if pattern.trim().is_empty() {
                anyhow::bail!("Include pattern cannot be empty");
            }
        }

        let retry = &config.retry;
        if retry.max_attempts == Some(0) {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        if let Some(multiplier) = retry.multiplier {
            if !multiplier.is_finite() || multiplier < 1.0 {
                anyhow::bail!("retry.multiplier must be a number >= 1.0, got {multiplier}");
            }
        }
        if let (Some(initial), Some(max)) = (retry.initial_delay_ms, retry.max_delay_ms) {
            if initial > max {
                anyhow::bail!(
                    "retry.initial_delay_ms ({initial}) exceeds retry.max_delay_ms ({max})"
                );
            }
        }
        for status in &retry.retry_status_codes {
            if !(100..=599).contains(status) {
                anyhow::bail!("retry.retry_status_codes contains invalid HTTP status {status}");
            }
        }

        Ok(())
    }

    /// Check that the API URL is an absolute http(s) URL
    ///
    /// # Errors
    ///
    /// Returns an error if the URL has no http or https scheme or no host.
    pub fn validate_url(url: &str) -> anyhow::Result<()> {
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .ok_or_else(|| anyhow::anyhow!("api_url must start with http:// or https://: {url}"))?;

        if rest.trim_matches('/').is_empty() {
            anyhow::bail!("api_url has no host: {url}");
        }
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_empty_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_url_scheme() {
        assert!(ConfigValidator::validate_url("https://hub.example.com").is_ok());
        assert!(ConfigValidator::validate_url("http://localhost:8080/").is_ok());

        let err = ConfigValidator::validate_url("ftp://hub.example.com").unwrap_err();
        assert!(err.to_string().contains("http:// or https://"));
        assert!(ConfigValidator::validate_url("https://").is_err());
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let config = Config {
            concurrency: Some(0),
            ..Config::default()
        };

        let result = ConfigValidator::validate(&config);
        assert!(result.unwrap_err().to_string().contains("concurrency"));
    }

    #[test]
    fn test_validate_empty_pattern() {
        let mut config = Config::default();
        config.ignore.push("   ".to_string());

        let result = ConfigValidator::validate(&config);

        assert!(result.unwrap_err().to_string().contains("cannot be empty"));
    }

    #[test]
    fn test_validate_retry_settings() {
        let mut config = Config::default();
        config.retry.max_attempts = Some(0);
        assert!(ConfigValidator::validate(&config).is_err());

        config.retry.max_attempts = Some(3);
        config.retry.multiplier = Some(0.5);
        assert!(ConfigValidator::validate(&config).is_err());

        config.retry.multiplier = Some(2.0);
        config.retry.initial_delay_ms = Some(5_000);
        config.retry.max_delay_ms = Some(100);
        assert!(ConfigValidator::validate(&config).is_err());

        config.retry.max_delay_ms = Some(10_000);
        config.retry.retry_status_codes = vec![999];
        assert!(ConfigValidator::validate(&config).is_err());

        config.retry.retry_status_codes = vec![408];
        assert!(ConfigValidator::validate(&config).is_ok());
    }
}
