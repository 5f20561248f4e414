//! Logging configuration using tracing
//!
//! Console output goes to stderr and honours `RUST_LOG` (default `warn`,
//! `info` with `--verbose`). Push and pull also append debug-level records
//! to a log file in the working directory's state folder.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use cmsync_core::manifest::STATE_DIR;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Name of the log file inside the state folder
pub const LOG_FILE: &str = "cmsync.log";

const FILE_FILTER: &str = "warn,cmsync_core=debug,cmsync=debug";

/// Initialize the tracing subscriber
///
/// Returns the path of the log file when one could be opened below
/// `working_dir`. Calling it again is a no-op.
pub fn init(working_dir: Option<&Path>, verbose: bool) -> Option<PathBuf> {
    let default_level = if verbose { "info" } else { "warn" };
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(console_filter);

    let (log_path, file_layer) = match working_dir.and_then(open_log_file) {
        Some((path, file)) => {
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(EnvFilter::new(FILE_FILTER));
            (Some(path), Some(layer))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init();

    log_path
}

fn open_log_file(working_dir: &Path) -> Option<(PathBuf, File)> {
    if !working_dir.is_dir() {
        return None;
    }
    let dir = working_dir.join(STATE_DIR);
    std::fs::create_dir_all(&dir).ok()?;
    let path = dir.join(LOG_FILE);
    let file = OpenOptions::new().create(true).append(true).open(&path).ok()?;
    Some((path, file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_file_created_in_state_dir() {
        let dir = TempDir::new().unwrap();
        let (path, _) = open_log_file(dir.path()).unwrap();
        assert_eq!(path, dir.path().join(STATE_DIR).join(LOG_FILE));
        assert!(path.exists());
    }

    #[test]
    fn test_no_log_file_for_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(open_log_file(&dir.path().join("missing")).is_none());
    }

    #[test]
    fn test_init_twice() {
        let dir = TempDir::new().unwrap();
        init(Some(dir.path()), false);
        init(None, true);
        tracing::warn!(kind = "types", "structured warning");
    }
}
