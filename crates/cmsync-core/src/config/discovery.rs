//! Configuration file discovery from multiple locations

use std::path::{Path, PathBuf};

/// Project-local config file name, meant to stay out of version control
pub const LOCAL_CONFIG_NAME: &str = ".cmsync.local.toml";

/// Project config file name
pub const PROJECT_CONFIG_NAME: &str = ".cmsync.toml";

/// Configuration file locations in order of precedence
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigFiles {
    /// Config from CLI flag (highest precedence)
    pub cli: Option<PathBuf>,
    /// Project-local config (.cmsync.local.toml)
    pub local: Option<PathBuf>,
    /// Project config (.cmsync.toml)
    pub project: Option<PathBuf>,
    /// Global config in the user config directory
    pub global: Option<PathBuf>,
}

impl ConfigFiles {
    /// Discovered files from highest to lowest precedence
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        [&self.cli, &self.local, &self.project, &self.global]
            .into_iter()
            .filter_map(|p| p.as_deref())
    }
}

/// Config file discovery
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Create a new config discovery instance
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Discover all available configuration files
    ///
    /// Project files are searched in `start_dir` and its ancestors.
    pub fn discover(start_dir: &Path, cli_path: Option<&Path>) -> ConfigFiles {
        let cli = cli_path.filter(|p| p.is_file()).map(Path::to_path_buf);

        ConfigFiles {
            cli,
            local: Self::find_file(start_dir, LOCAL_CONFIG_NAME),
            project: Self::find_file(start_dir, PROJECT_CONFIG_NAME),
            global: Self::find_global_config(),
        }
    }

    /// Find a config file in `start_dir` or its parent directories
    fn find_file(start_dir: &Path, name: &str) -> Option<PathBuf> {
        let mut current = dunce::canonicalize(start_dir).ok()?;

        loop {
            let candidate = current.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Global config path, whether or not it exists
    #[must_use]
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cmsync").join("config.toml"))
    }

    fn find_global_config() -> Option<PathBuf> {
        Self::global_config_path().filter(|p| p.is_file())
    }
}

impl Default for ConfigDiscovery {
    fn default() -> Self {
        Self::new()
    }
}
