//! Common types and utilities for command execution

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use cmsync_core::ArtifactKind;
use cmsync_core::config::{Config, ConfigManager, ConfigValidator};
use cmsync_core::manifest::HashManifest;
use cmsync_core::store::{Credentials, LocalItemStore, RestItemStore};
use cmsync_core::sync::{
    EventEmitter, ReconciliationEngine, SelectionMode, StatusFilter, SyncContext, SyncEvent,
};
use dialoguer::Password;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cli::SelectionArgs;

/// Execution options shared by every command
#[allow(clippy::struct_excessive_bools)]
pub struct CommandOptions<'a> {
    /// Enable verbose output
    pub verbose: bool,
    /// Preview changes without applying (dry-run)
    pub dry_run: bool,
    /// Working directory holding the artifact folders
    pub dir: &'a Path,
    /// Content hub URL from the command line or environment
    pub url: Option<&'a str>,
    /// User name from the command line or environment
    pub user: Option<&'a str>,
    /// Password from the command line or environment
    pub password: Option<&'a str>,
    /// Path to custom config file
    pub config_path: Option<&'a Path>,
    /// Skip loading all config files
    pub no_config: bool,
    /// Log file the summaries point to
    pub log_file: Option<&'a Path>,
}

impl CommandOptions<'_> {
    /// Load the merged configuration, or the defaults with `--no-config`
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is missing or invalid.
    pub fn load_config(&self) -> anyhow::Result<Config> {
        if self.no_config {
            return Ok(Config::default());
        }
        ConfigManager::load(self.dir, self.config_path).context("Failed to load configuration")
    }

    /// Content hub URL from the command line, then the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if no URL is configured or it is invalid.
    pub fn api_url(&self, config: &Config) -> anyhow::Result<String> {
        let url = self
            .url
            .map(str::to_string)
            .or_else(|| config.api_url.clone())
            .context("No content hub URL configured (use --url or CMSYNC_URL)")?;
        ConfigValidator::validate_url(&url)?;
        Ok(url)
    }

    /// Basic-auth credentials, prompting for a missing password
    ///
    /// Without a user name requests are sent anonymously.
    ///
    /// # Errors
    ///
    /// Returns an error if a password is needed but cannot be prompted for.
    pub fn credentials(&self, config: &Config) -> anyhow::Result<Option<Credentials>> {
        let Some(username) = self.user.map(str::to_string).or_else(|| config.username.clone())
        else {
            return Ok(None);
        };

        let password = match self.password {
            Some(password) => password.to_string(),
            None if std::io::stdin().is_terminal() => Password::new()
                .with_prompt(format!("Password for {username}"))
                .interact()
                .context("Failed to read password")?,
            None => anyhow::bail!(
                "No password for user {username} (use --password or CMSYNC_PASSWORD)"
            ),
        };

        Ok(Some(Credentials { username, password }))
    }
}

/// Artifact types selected on the command line, in `order`
///
/// No `--type` selects every type. Types `selection` cannot be applied to
/// (path filters on types not addressed by path) are left out.
pub fn selected_kinds(
    args: &SelectionArgs,
    selection: &SelectionMode,
    order: &[ArtifactKind],
) -> Vec<ArtifactKind> {
    let wanted: Vec<ArtifactKind> = args.types.iter().map(|t| ArtifactKind::from(*t)).collect();
    order
        .iter()
        .copied()
        .filter(|k| args.all_authoring || wanted.is_empty() || wanted.contains(k))
        .filter(|k| {
            let applies = selection.applies_to(*k);
            if !applies {
                debug!(kind = %k, "path filter does not apply, skipping");
            }
            applies
        })
        .collect()
}

/// Working set selection described by the command-line flags
///
/// # Errors
///
/// Returns an error if `--named` is used without exactly one type.
pub fn selection_mode(args: &SelectionArgs) -> anyhow::Result<SelectionMode> {
    if let Some(name) = &args.named {
        if args.types.len() != 1 || args.all_authoring {
            anyhow::bail!("--named requires exactly one --type");
        }
        return Ok(SelectionMode::Named(name.clone()));
    }

    if args.path.is_some()
        && !args.types.is_empty()
        && !args
            .types
            .iter()
            .any(|t| ArtifactKind::from(*t).config().is_path_based())
    {
        anyhow::bail!("--path only applies to types, layouts, layout-mappings and pages");
    }

    Ok(match &args.path {
        Some(prefix) => SelectionMode::PathFiltered {
            prefix: prefix.clone(),
            modified_only: !args.ignore_timestamps,
        },
        None if args.ignore_timestamps => SelectionMode::All,
        None => SelectionMode::Modified,
    })
}

/// Ready/draft filter described by the command-line flags
pub const fn status_filter(args: &SelectionArgs) -> StatusFilter {
    if args.ready {
        StatusFilter::Ready
    } else if args.draft {
        StatusFilter::Draft
    } else {
        StatusFilter::Any
    }
}

/// Everything needed to build one engine per artifact type
pub struct EngineFactory {
    dir: PathBuf,
    config: Config,
    url: String,
    credentials: Option<Credentials>,
    manifest: Arc<Mutex<HashManifest>>,
}

impl EngineFactory {
    /// Resolve configuration, URL, credentials and the manifest
    ///
    /// # Errors
    ///
    /// Returns an error if configuration or credentials cannot be resolved.
    pub async fn new(options: &CommandOptions<'_>) -> anyhow::Result<Self> {
        let config = options.load_config()?;
        let url = options.api_url(&config)?;
        let credentials = options.credentials(&config)?;
        let manifest = HashManifest::load(options.dir).await;

        Ok(Self {
            dir: options.dir.to_path_buf(),
            config,
            url,
            credentials,
            manifest: Arc::new(Mutex::new(manifest)),
        })
    }

    /// Merged configuration
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Engine for one artifact type
    ///
    /// # Errors
    ///
    /// Returns an error if the ignore patterns are invalid or the HTTP
    /// client cannot be created.
    pub fn engine(&self, kind: ArtifactKind) -> anyhow::Result<ReconciliationEngine> {
        let local =
            LocalItemStore::new(&self.dir, kind).with_matcher(self.config.pattern_matcher()?);
        let remote = RestItemStore::new(
            kind,
            &self.url,
            self.credentials.clone(),
            self.config.request_timeout(),
        )?;

        Ok(
            ReconciliationEngine::new(local, Arc::new(remote), Arc::clone(&self.manifest))
                .with_concurrency(self.config.concurrency()),
        )
    }

    /// Context for one artifact type with the configured retry policy
    pub fn context(&self, kind: ArtifactKind) -> SyncContext {
        SyncContext::new(kind).with_retry(self.config.retry_policy())
    }
}

/// Print per-item events while a type is being synced
///
/// Failures are reported through the log, successes only in verbose mode.
pub struct EventPrinter {
    task: JoinHandle<()>,
}

impl EventPrinter {
    /// Spawn the printer, returning the emitter to put in the context
    pub fn spawn(verbose: bool) -> (EventEmitter, Self) {
        let (emitter, mut receiver) = EventEmitter::channel();
        let task = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                if verbose {
                    if let Some(line) = describe(&event) {
                        println!("{line}");
                    }
                }
            }
        });
        (emitter, Self { task })
    }

    /// Wait for every event to be printed
    ///
    /// The channel closes once every emitter is dropped.
    pub async fn finish(self) {
        if let Err(e) = self.task.await {
            warn!("event printer stopped: {e}");
        }
    }
}

fn describe(event: &SyncEvent) -> Option<String> {
    match event {
        SyncEvent::Pulled { name } => Some(format!("  ✓ pulled {name}")),
        SyncEvent::PulledWarning { name, message } => {
            Some(format!("  ! pulled {name}: {message}"))
        }
        SyncEvent::Pushed { name, outcome } => Some(format!("  ✓ {name} ({outcome})")),
        SyncEvent::PulledError { .. } | SyncEvent::PushedError { .. } => None,
    }
}
