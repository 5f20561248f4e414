//! Per-operation context: what to select and how to write it

use super::events::EventEmitter;
use super::retry::RetryPolicy;
use crate::kinds::ArtifactKind;

/// Which artifacts make up the working set
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Every artifact
    All,
    /// Artifacts changed since they were last synced
    #[default]
    Modified,
    /// The single artifact whose name, path or id matches
    Named(String),
    /// Artifacts of a path-based type below a path prefix
    PathFiltered {
        /// Path prefix, with or without the leading slash
        prefix: String,
        /// Restrict further to modified artifacts
        modified_only: bool,
    },
}

impl SelectionMode {
    /// Whether the selection can be applied to `kind`
    ///
    /// Path filters only make sense for path-based types; a run over
    /// several types skips the others.
    #[must_use]
    pub fn applies_to(&self, kind: ArtifactKind) -> bool {
        !matches!(self, Self::PathFiltered { .. }) || kind.config().is_path_based()
    }
}

/// Ready/draft filter for versioned types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    /// No filtering
    #[default]
    Any,
    /// Only items whose status is `ready`
    Ready,
    /// Only items whose status is `draft`
    Draft,
}

impl StatusFilter {
    /// Whether an item with `status` passes the filter
    ///
    /// Items without a status are treated as ready.
    #[must_use]
    pub fn accepts(self, status: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::Ready => status.is_none_or(|s| s == "ready"),
            Self::Draft => status == Some("draft"),
        }
    }
}

/// Options shared by push and pull
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Working set selection
    pub selection: SelectionMode,
    /// Always create, never update
    pub create_only: bool,
    /// Ask the server to ignore revision mismatches
    pub force_override: bool,
    /// Keep treating create-only conflicts as success under force override
    pub conflict_ignored_with_force_override: bool,
    /// Ready/draft filter for versioned types
    pub status: StatusFilter,
    /// Stop scheduling items after the first permanent failure
    pub fail_fast: bool,
    /// Compute and report without writing anything
    pub dry_run: bool,
    /// Tag added to pushed items of types with tags
    pub set_tag: Option<String>,
    /// Library assigned to pushed items of types with libraries
    pub set_library: Option<String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            selection: SelectionMode::default(),
            create_only: false,
            force_override: false,
            conflict_ignored_with_force_override: true,
            status: StatusFilter::default(),
            fail_fast: false,
            dry_run: false,
            set_tag: None,
            set_library: None,
        }
    }
}

impl SyncOptions {
    /// Options selecting `selection` with every other option at its default
    #[must_use]
    pub fn selecting(selection: SelectionMode) -> Self {
        Self {
            selection,
            ..Self::default()
        }
    }
}

/// Everything one push or pull of one artifact type needs
#[derive(Debug, Clone)]
pub struct SyncContext {
    /// Artifact type being synced
    pub kind: ArtifactKind,
    /// Selection and write options
    pub options: SyncOptions,
    /// Retry policy for remote calls
    pub retry: RetryPolicy,
    /// Where per-item events go
    pub events: EventEmitter,
}

impl SyncContext {
    /// Context with default options, the default retry policy and no events
    #[must_use]
    pub fn new(kind: ArtifactKind) -> Self {
        Self {
            kind,
            options: SyncOptions::default(),
            retry: RetryPolicy::default(),
            events: EventEmitter::silent(),
        }
    }

    /// Replace the options
    #[must_use]
    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Send events to `events`
    #[must_use]
    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = events;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_filter() {
        assert!(StatusFilter::Any.accepts(Some("draft")));
        assert!(StatusFilter::Ready.accepts(Some("ready")));
        assert!(StatusFilter::Ready.accepts(None));
        assert!(!StatusFilter::Ready.accepts(Some("draft")));
        assert!(StatusFilter::Draft.accepts(Some("draft")));
        assert!(!StatusFilter::Draft.accepts(None));
    }

    #[test]
    fn test_path_filter_applies_to_path_based_types_only() {
        let filtered = SelectionMode::PathFiltered {
            prefix: "/site".into(),
            modified_only: true,
        };
        assert!(filtered.applies_to(ArtifactKind::Layouts));
        assert!(filtered.applies_to(ArtifactKind::Pages));
        assert!(!filtered.applies_to(ArtifactKind::Categories));
        assert!(!filtered.applies_to(ArtifactKind::ImageProfiles));
        assert!(SelectionMode::Modified.applies_to(ArtifactKind::Categories));
    }

    #[test]
    fn test_defaults() {
        let options = SyncOptions::default();
        assert_eq!(options.selection, SelectionMode::Modified);
        assert!(options.conflict_ignored_with_force_override);
        assert!(!options.create_only);

        let ctx = SyncContext::new(ArtifactKind::Pages);
        assert_eq!(ctx.kind, ArtifactKind::Pages);
        assert_eq!(ctx.options.selection, SelectionMode::Modified);
        assert!(!ctx.options.dry_run);
    }
}
