//! Error types for synchronization operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for cmsync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur while listing, reading, pushing or pulling artifacts.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The artifact does not exist locally or remotely.
    #[error("{service} item not found: {name}")]
    NotFound {
        /// Service name of the artifact type.
        service: String,
        /// Name, path or id that was looked up.
        name: String,
    },

    /// Optimistic-concurrency violation reported by the server.
    #[error("conflict ({status}) for {name}: {message}")]
    Conflict {
        /// HTTP status of the response (409, or 400 for draft conflicts).
        status: u16,
        /// Name of the artifact being written.
        name: String,
        /// Server message.
        message: String,
    },

    /// Network or HTTP failure.
    #[error("transport error{}: {message}", status_suffix(.status))]
    Transport {
        /// HTTP status, if a response was received.
        status: Option<u16>,
        /// Error message.
        message: String,
    },

    /// Local disk failure.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A local or remote document was not valid JSON for an artifact.
    #[error("invalid artifact JSON in {origin}: {message}")]
    Parse {
        /// File path or URL the document came from.
        origin: String,
        /// Parser message.
        message: String,
    },

    /// Invalid working-set selection.
    #[error("invalid selection: {0}")]
    Validation(String),

    /// A name selected more than one artifact.
    #[error("name '{name}' matches {count} artifacts, select one by path or id")]
    AmbiguousName {
        /// The requested name.
        name: String,
        /// Number of matching artifacts.
        count: usize,
    },

    /// A fail-fast batch stopped after a permanent item failure.
    #[error("batch aborted after {completed} item(s): {first_error}")]
    BatchAborted {
        /// Items that finished (successfully or not) before the abort.
        completed: usize,
        /// Message of the failure that triggered the abort.
        first_error: String,
    },

    /// Unexpected internal failure (task join, poisoned state).
    #[error("internal error: {0}")]
    Internal(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl SyncError {
    /// Creates an I/O error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a not-found error.
    pub fn not_found(service: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            service: service.into(),
            name: name.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transport {
            status,
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Conflict { status, .. } => Some(*status),
            Self::Transport { status, .. } => *status,
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Whether this is a not-found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this is a conflict error.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true if the failure is transient by nature.
    ///
    /// Connection failures and throttling/server-side statuses are transient.
    /// Disk, parse, selection and conflict errors never are; conflicts are
    /// only retried when a retry policy opts in.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { status: None, .. } => true,
            Self::Transport {
                status: Some(status),
                ..
            } => matches!(status, 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
