//! Configuration file parsing, merging, and pattern matching
//!
//! This module handles:
//! - Config file discovery from the working directory upwards and the
//!   user config directory
//! - TOML parsing with serde
//! - Config merging with precedence rules
//! - Gitignore-style pattern matching of local artifact files
//! - Validation and error reporting

mod discovery;
mod merge;
mod patterns;
mod types;
mod validation;


use std::path::Path;

pub use discovery::{ConfigDiscovery, ConfigFiles};
pub use merge::ConfigMerger;
pub use patterns::PatternMatcher;
pub use types::{Config, RetrySettings};
pub use validation::ConfigValidator;

/// Configuration manager that coordinates discovery, parsing, merging, and validation
pub struct ConfigManager;

impl ConfigManager {
    /// Create a new configuration manager
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Load and merge configuration from all sources
    ///
    /// `start_dir` is where the search for project config files begins,
    /// normally the working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit config file is missing, or if any
    /// config file is unreadable or invalid.
    pub fn load(start_dir: &Path, cli_config_path: Option<&Path>) -> anyhow::Result<Config> {
        if let Some(path) = cli_config_path {
            if !path.is_file() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
        }

        let config_files = ConfigDiscovery::discover(start_dir, cli_config_path);
        let merged = ConfigMerger::merge(&config_files)?;
        ConfigValidator::validate(&merged)?;

        Ok(merged)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
