//! Configuration merging with precedence rules
//!
//! # Merging Semantics
//!
//! - **Arrays** (`ignore`, `include`, `retry.retry_status_codes`): additive,
//!   values from all configs are combined
//! - **Scalars**: a value set in a higher-precedence file replaces the one
//!   from a lower-precedence file; unset values leave it alone

use std::fs;
use std::path::Path;

use anyhow::Context;

use super::discovery::ConfigFiles;
use super::types::Config;

/// Configuration merger
pub struct ConfigMerger;

impl ConfigMerger {
    /// Create a new config merger
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Merge multiple config files with precedence rules
    ///
    /// Precedence order (highest to lowest):
    /// 1. CLI config
    /// 2. .cmsync.local
    /// 3. .cmsync
    /// 4. Global config
    ///
    /// # Errors
    ///
    /// Returns an error if config files cannot be read or parsed.
    pub fn merge(files: &ConfigFiles) -> anyhow::Result<Config> {
        let mut merged = Config::default();

        // Lowest precedence first so later files win
        let ordered: Vec<&Path> = files.iter().collect();
        for path in ordered.into_iter().rev() {
            Self::merge_into(&mut merged, path)?;
        }

        Ok(merged)
    }

    /// Load and merge a single config file into the existing config
    fn merge_into(base: &mut Config, path: &Path) -> anyhow::Result<()> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Self::merge_config(base, config);
        Ok(())
    }

    /// Merge an already parsed config over `base`
    pub fn merge_config(base: &mut Config, config: Config) {
        base.ignore.extend(config.ignore);
        base.include.extend(config.include);

        override_with(&mut base.api_url, config.api_url);
        override_with(&mut base.username, config.username);
        override_with(&mut base.concurrency, config.concurrency);
        override_with(&mut base.request_timeout_secs, config.request_timeout_secs);
        override_with(
            &mut base.conflict_ignored_with_force_override,
            config.conflict_ignored_with_force_override,
        );

        let retry = config.retry;
        override_with(&mut base.retry.max_attempts, retry.max_attempts);
        override_with(&mut base.retry.initial_delay_ms, retry.initial_delay_ms);
        override_with(&mut base.retry.max_delay_ms, retry.max_delay_ms);
        override_with(&mut base.retry.multiplier, retry.multiplier);
        override_with(&mut base.retry.retry_conflicts, retry.retry_conflicts);
        base.retry
            .retry_status_codes
            .extend(retry.retry_status_codes);
    }
}

fn override_with<T>(base: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *base = value;
    }
}

impl Default for ConfigMerger {
    fn default() -> Self {
        Self::new()
    }
}
