//! Sync orchestration - computes working sets and drives the batch

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::SyncResult;
use super::actions::{PullOutcome, PushOutcome};
use super::context::{SelectionMode, SyncContext};
use super::executor::{ItemExecutor, WorkingEntry};
use super::throttle::{ConcurrencyThrottle, DEFAULT_CONCURRENCY, ItemOutcome};
use crate::artifact::{Artifact, ArtifactRef};
use crate::error::{Result, SyncError};
use crate::kinds::ArtifactKind;
use crate::manifest::HashManifest;
use crate::store::{LocalItemStore, RemoteItemStore};

/// Result of a pull
pub type PullResult = SyncResult;

/// Result of a push
pub type PushResult = SyncResult;

/// Ordered artifacts an operation acts on, computed once up front
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    entries: Vec<WorkingEntry>,
}

impl WorkingSet {
    /// Number of artifacts
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// References in order
    pub fn refs(&self) -> impl Iterator<Item = &ArtifactRef> {
        self.entries.iter().map(|e| &e.reference)
    }

    /// Consume into the entries
    #[must_use]
    pub fn into_entries(self) -> Vec<WorkingEntry> {
        self.entries
    }
}

impl FromIterator<WorkingEntry> for WorkingSet {
    fn from_iter<T: IntoIterator<Item = WorkingEntry>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Reconciles one artifact type between the working directory and the server
pub struct ReconciliationEngine {
    local: LocalItemStore,
    remote: Arc<dyn RemoteItemStore>,
    manifest: Arc<Mutex<HashManifest>>,
    concurrency: usize,
}

impl ReconciliationEngine {
    /// Create an engine over a local and a remote store of the same type
    #[must_use]
    pub fn new(
        local: LocalItemStore,
        remote: Arc<dyn RemoteItemStore>,
        manifest: Arc<Mutex<HashManifest>>,
    ) -> Self {
        Self {
            local,
            remote,
            manifest,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Set the number of in-flight items
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Local store of this engine
    #[must_use]
    pub const fn local(&self) -> &LocalItemStore {
        &self.local
    }

    fn check_kind(&self, ctx: &SyncContext) -> Result<()> {
        let remote = self.remote.kind();
        if ctx.kind == self.local.kind() && ctx.kind == remote {
            Ok(())
        } else {
            Err(SyncError::Internal(format!(
                "context is for {} but the stores are for {} and {remote}",
                ctx.kind,
                self.local.kind()
            )))
        }
    }

    fn throttle(&self, ctx: &SyncContext) -> ConcurrencyThrottle {
        ConcurrencyThrottle::new(self.concurrency).fail_fast(ctx.options.fail_fast)
    }

    /// Local artifacts selected for a push
    ///
    /// Named selections fail with `NotFound` or `AmbiguousName` here, before
    /// anything is sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the selection is invalid or the folder cannot be
    /// listed.
    pub async fn compute_push_set(&self, ctx: &SyncContext) -> Result<WorkingSet> {
        self.check_kind(ctx)?;
        let kind = ctx.kind;
        let refs: Vec<ArtifactRef> = self
            .local
            .list_names()
            .await?
            .into_iter()
            .filter(|r| accepts_status(ctx, r))
            .collect();

        let selected = match &ctx.options.selection {
            SelectionMode::All => refs,
            SelectionMode::Modified => self.locally_modified(kind, refs).await,
            SelectionMode::Named(name) => vec![single_match(kind, name, refs)?],
            SelectionMode::PathFiltered {
                prefix,
                modified_only,
            } => {
                let prefix = path_prefix(kind, prefix)?;
                let refs = refs
                    .into_iter()
                    .filter(|r| r.path.as_deref().is_some_and(|p| under_prefix(p, &prefix)))
                    .collect();
                if *modified_only {
                    self.locally_modified(kind, refs).await
                } else {
                    refs
                }
            }
        };

        debug!(%kind, count = selected.len(), "computed push working set");
        Ok(selected.into_iter().map(WorkingEntry::new).collect())
    }

    async fn locally_modified(&self, kind: ArtifactKind, refs: Vec<ArtifactRef>) -> Vec<ArtifactRef> {
        let manifest = self.manifest.lock().await;
        let mut modified = Vec::new();
        for r in refs {
            let changed = match r.location.as_deref() {
                Some(location) => manifest.is_local_modified(kind, location).await,
                None => true,
            };
            if changed {
                modified.push(r);
            }
        }
        modified
    }

    /// Remote artifacts selected for a pull
    ///
    /// Each entry carries the listed artifact and the location it will be
    /// written to: the file already holding that id, or a new one.
    ///
    /// # Errors
    ///
    /// Returns an error if the selection is invalid or a listing fails.
    pub async fn compute_pull_set(&self, ctx: &SyncContext) -> Result<WorkingSet> {
        self.check_kind(ctx)?;
        let kind = ctx.kind;
        let selection = &ctx.options.selection;

        if let SelectionMode::PathFiltered { prefix, .. } = selection {
            path_prefix(kind, prefix)?;
        }

        let listed = match selection {
            SelectionMode::Modified
            | SelectionMode::PathFiltered {
                modified_only: true,
                ..
            } => {
                let since = self.manifest.lock().await.last_pull(kind);
                self.remote.list_modified_since(since).await?
            }
            _ => self.remote.list_all().await?,
        };

        let index = self.location_index().await?;
        let entries: Vec<WorkingEntry> = listed
            .into_iter()
            .map(|artifact| {
                let mut reference = ArtifactRef::from_artifact(&artifact);
                reference.location = self.resolve_location(&index, &artifact);
                WorkingEntry {
                    reference,
                    artifact: Some(artifact),
                }
            })
            .filter(|e| accepts_status(ctx, &e.reference))
            .collect();

        let selected = match selection {
            SelectionMode::All => entries,
            SelectionMode::Modified => self.remotely_modified(kind, entries).await,
            SelectionMode::Named(name) => {
                let matching: Vec<WorkingEntry> = entries
                    .into_iter()
                    .filter(|e| e.reference.matches(name))
                    .collect();
                match matching.len() {
                    0 => return Err(SyncError::not_found(kind.service_name(), name.clone())),
                    1 => matching,
                    count => {
                        return Err(SyncError::AmbiguousName {
                            name: name.clone(),
                            count,
                        });
                    }
                }
            }
            SelectionMode::PathFiltered {
                prefix,
                modified_only,
            } => {
                let prefix = path_prefix(kind, prefix)?;
                let entries = entries
                    .into_iter()
                    .filter(|e| {
                        e.reference
                            .path
                            .as_deref()
                            .is_some_and(|p| under_prefix(p, &prefix))
                    })
                    .collect();
                if *modified_only {
                    self.remotely_modified(kind, entries).await
                } else {
                    entries
                }
            }
        };

        debug!(%kind, count = selected.len(), "computed pull working set");
        Ok(selected.into_iter().collect())
    }

    async fn remotely_modified(&self, kind: ArtifactKind, entries: Vec<WorkingEntry>) -> Vec<WorkingEntry> {
        let manifest = self.manifest.lock().await;
        let mut modified = Vec::new();
        for entry in entries {
            let changed = match entry.reference.location.as_deref() {
                Some(location) => {
                    manifest
                        .is_remote_modified(kind, location, entry.reference.last_modified)
                        .await
                }
                None => true,
            };
            if changed {
                modified.push(entry);
            }
        }
        modified
    }

    /// Map local ids (and paths) to the files holding them
    async fn location_index(&self) -> Result<HashMap<String, String>> {
        let mut index = HashMap::new();
        for r in self.local.list_names().await? {
            let Some(location) = r.location else {
                continue;
            };
            if let Some(id) = r.id {
                index.insert(id, location.clone());
            }
            if let Some(path) = r.path {
                index.entry(path).or_insert(location);
            }
        }
        Ok(index)
    }

    fn resolve_location(&self, index: &HashMap<String, String>, artifact: &Artifact) -> Option<String> {
        artifact
            .id()
            .and_then(|id| index.get(id))
            .or_else(|| artifact.path().and_then(|path| index.get(path)))
            .cloned()
            .or_else(|| self.local.location_for(artifact).ok())
    }

    /// Pull the working set selected by `ctx`
    ///
    /// Per-item failures are counted and emitted, they do not fail the call.
    /// A complete pull without errors records its start time so that the
    /// next modified pull lists only newer items.
    ///
    /// # Errors
    ///
    /// Returns an error if the working set cannot be computed, or
    /// `BatchAborted` in fail-fast mode.
    pub async fn pull(&self, ctx: &SyncContext) -> Result<PullResult> {
        let started = Utc::now();
        let set = self.compute_pull_set(ctx).await?;
        let outcomes = self.run_pull(ctx, set).await?;

        let mut result = PullResult::default();
        for outcome in outcomes {
            match outcome.result {
                Ok(pulled) => result.record_pull(&pulled),
                Err(e) => result.record_error(&outcome.item.reference, &e),
            }
        }

        let complete = matches!(
            ctx.options.selection,
            SelectionMode::All | SelectionMode::Modified
        );
        if complete && result.is_success() && !ctx.options.dry_run {
            self.manifest.lock().await.set_last_pull(ctx.kind, started).await;
        }

        info!(
            kind = %ctx.kind,
            pulled = result.count,
            errors = result.error_count,
            warnings = result.warning_count,
            "pull finished"
        );
        Ok(result)
    }

    async fn run_pull(
        &self,
        ctx: &SyncContext,
        set: WorkingSet,
    ) -> Result<Vec<ItemOutcome<WorkingEntry, PullOutcome>>> {
        let executor = ItemExecutor::new(ctx, &self.local, self.remote.as_ref(), &self.manifest);
        let executor = &executor;
        self.throttle(ctx)
            .run(set.into_entries(), &ctx.retry, move |entry, attempt| {
                executor.pull_item(entry, attempt)
            })
            .await
    }

    /// Push the working set selected by `ctx`
    ///
    /// # Errors
    ///
    /// Returns an error if the working set cannot be computed, or
    /// `BatchAborted` in fail-fast mode.
    pub async fn push(&self, ctx: &SyncContext) -> Result<PushResult> {
        let set = self.compute_push_set(ctx).await?;
        let outcomes = self.run_push(ctx, set).await?;

        let mut result = PushResult::default();
        for outcome in outcomes {
            match outcome.result {
                Ok(pushed) => result.record_push(pushed),
                Err(e) => result.record_error(&outcome.item, &e),
            }
        }

        info!(
            kind = %ctx.kind,
            pushed = result.count,
            errors = result.error_count,
            "push finished"
        );
        Ok(result)
    }

    async fn run_push(
        &self,
        ctx: &SyncContext,
        set: WorkingSet,
    ) -> Result<Vec<ItemOutcome<ArtifactRef, PushOutcome>>> {
        let refs: Vec<ArtifactRef> = set.into_entries().into_iter().map(|e| e.reference).collect();
        let executor = ItemExecutor::new(ctx, &self.local, self.remote.as_ref(), &self.manifest);
        let executor = &executor;
        self.throttle(ctx)
            .run(refs, &ctx.retry, move |reference, attempt| {
                executor.push_item(reference, attempt)
            })
            .await
    }

    /// Push the one local artifact matching `name`
    ///
    /// # Errors
    ///
    /// Returns the selection error, or the final error of the push, which is
    /// also emitted as an event.
    pub async fn push_named_item(&self, ctx: &SyncContext, name: &str) -> Result<PushOutcome> {
        let ctx = named(ctx, name);
        let set = self.compute_push_set(&ctx).await?;
        let outcome = self
            .run_push(&ctx, set)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::not_found(ctx.kind.service_name(), name))?;
        outcome.result
    }

    /// Pull the one remote artifact matching `name`
    ///
    /// # Errors
    ///
    /// Returns the selection error, or the final error of the pull, which is
    /// also emitted as an event.
    pub async fn pull_named_item(&self, ctx: &SyncContext, name: &str) -> Result<PullOutcome> {
        let ctx = named(ctx, name);
        let set = self.compute_pull_set(&ctx).await?;
        let outcome = self
            .run_pull(&ctx, set)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::not_found(ctx.kind.service_name(), name))?;
        outcome.result
    }

    /// Fetch the remote version of the local artifact matching `name`
    ///
    /// Returns the local artifact, pruned as it would be pushed, and the
    /// remote one, pruned the same way.
    ///
    /// # Errors
    ///
    /// Returns an error if the name does not select exactly one local
    /// artifact, if it has never been pushed, or if the fetch fails.
    pub async fn fetch_pair(&self, ctx: &SyncContext, name: &str) -> Result<(Artifact, Artifact)> {
        let ctx = named(ctx, name);
        let set = self.compute_push_set(&ctx).await?;
        let reference = set
            .refs()
            .next()
            .cloned()
            .ok_or_else(|| SyncError::not_found(ctx.kind.service_name(), name))?;
        let location = reference.location.clone().unwrap_or_default();

        let mut local = self.local.get(&location).await?;
        if local.id().is_none() && !ctx.kind.config().is_path_based() {
            return Err(SyncError::not_found(ctx.kind.service_name(), name));
        }
        let lookup = ArtifactRef {
            id: local.id().map(str::to_string),
            path: local.path().map(str::to_string),
            ..ArtifactRef::default()
        };
        let mut remote = self.remote.get(&lookup).await?;

        for item in [&mut local, &mut remote] {
            LocalItemStore::prune_for_push(item);
            self.local.prune_for_storage(item);
        }
        Ok((local, remote))
    }
}

fn named(ctx: &SyncContext, name: &str) -> SyncContext {
    let mut ctx = ctx.clone();
    ctx.options.selection = SelectionMode::Named(name.to_string());
    ctx
}

fn accepts_status(ctx: &SyncContext, reference: &ArtifactRef) -> bool {
    !ctx.kind.config().versioned || ctx.options.status.accepts(reference.status.as_deref())
}

fn single_match(kind: ArtifactKind, name: &str, refs: Vec<ArtifactRef>) -> Result<ArtifactRef> {
    let mut matching: Vec<ArtifactRef> = refs.into_iter().filter(|r| r.matches(name)).collect();
    match matching.len() {
        0 => Err(SyncError::not_found(kind.service_name(), name)),
        1 => Ok(matching.remove(0)),
        count => Err(SyncError::AmbiguousName {
            name: name.to_string(),
            count,
        }),
    }
}

/// Validate a path filter and give it a leading slash
fn path_prefix(kind: ArtifactKind, prefix: &str) -> Result<String> {
    if !kind.config().is_path_based() {
        return Err(SyncError::Validation(format!(
            "{kind} artifacts are not addressed by path"
        )));
    }
    Ok(format!("/{}", prefix.trim_matches('/')))
}

/// Whether `path` is `prefix` or lies below it
fn under_prefix(path: &str, prefix: &str) -> bool {
    prefix == "/"
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_prefix() {
        assert_eq!(path_prefix(ArtifactKind::Pages, "site/home").unwrap(), "/site/home");
        assert_eq!(path_prefix(ArtifactKind::Pages, "/site").unwrap(), "/site");
        assert_eq!(path_prefix(ArtifactKind::Pages, "site/").unwrap(), "/site");
        assert!(matches!(
            path_prefix(ArtifactKind::Content, "/x"),
            Err(SyncError::Validation(_))
        ));
    }

    #[test]
    fn test_under_prefix_stops_at_segment_boundary() {
        assert!(under_prefix("/site/home", "/site"));
        assert!(under_prefix("/site", "/site"));
        assert!(!under_prefix("/site-b/home", "/site"));
        assert!(!under_prefix("/sites", "/site"));
        assert!(under_prefix("/anything", "/"));
    }

    #[test]
    fn test_single_match() {
        let refs = vec![
            ArtifactRef {
                id: Some("1".into()),
                name: Some("Home".into()),
                ..ArtifactRef::default()
            },
            ArtifactRef {
                id: Some("2".into()),
                name: Some("About".into()),
                ..ArtifactRef::default()
            },
            ArtifactRef {
                id: Some("3".into()),
                name: Some("About".into()),
                ..ArtifactRef::default()
            },
        ];

        let home = single_match(ArtifactKind::Types, "Home", refs.clone()).unwrap();
        assert_eq!(home.id.as_deref(), Some("1"));
        assert_eq!(single_match(ArtifactKind::Types, "3", refs.clone()).unwrap().key(), "3");
        assert!(matches!(
            single_match(ArtifactKind::Types, "About", refs.clone()),
            Err(SyncError::AmbiguousName { count: 2, .. })
        ));
        assert!(single_match(ArtifactKind::Types, "Missing", refs).unwrap_err().is_not_found());
    }
}
