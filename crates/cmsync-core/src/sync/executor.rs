//! Per-item push and pull execution

use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use super::actions::{PullOutcome, PushAction, PushActionResolver, PushOutcome};
use super::context::SyncContext;
use super::events::SyncEvent;
use crate::artifact::{Artifact, ArtifactRef};
use crate::comparison::ContentHasher;
use crate::error::{Result, SyncError};
use crate::manifest::HashManifest;
use crate::store::{LocalItemStore, RemoteItemStore, WriteOptions};

/// Field holding the library an item belongs to
const LIBRARY_FIELD: &str = "libraryId";

/// An entry of a working set
///
/// Pull entries carry the artifact returned by the listing, when there was
/// one, so that it is not fetched a second time.
#[derive(Debug, Clone)]
pub struct WorkingEntry {
    /// Identity and location of the artifact
    pub reference: ArtifactRef,
    /// Prefetched remote artifact
    pub artifact: Option<Artifact>,
}

impl WorkingEntry {
    /// Entry without a prefetched artifact
    #[must_use]
    pub const fn new(reference: ArtifactRef) -> Self {
        Self {
            reference,
            artifact: None,
        }
    }
}

/// Executes one attempt of a push or pull for one item
///
/// Successes and final failures are logged and emitted as events; failures
/// the retry policy will retry are only logged at debug level.
pub struct ItemExecutor<'a> {
    ctx: &'a SyncContext,
    local: &'a LocalItemStore,
    remote: &'a dyn RemoteItemStore,
    manifest: &'a Mutex<HashManifest>,
}

impl<'a> ItemExecutor<'a> {
    /// Create an executor for one operation
    #[must_use]
    pub const fn new(
        ctx: &'a SyncContext,
        local: &'a LocalItemStore,
        remote: &'a dyn RemoteItemStore,
        manifest: &'a Mutex<HashManifest>,
    ) -> Self {
        Self {
            ctx,
            local,
            remote,
            manifest,
        }
    }

    fn is_final(&self, err: &SyncError, attempt: u32) -> bool {
        !self.ctx.retry.should_retry(err, attempt)
    }

    /// Push the local artifact behind `reference`
    ///
    /// # Errors
    ///
    /// Returns the error of this attempt.
    pub async fn push_item(&self, reference: ArtifactRef, attempt: u32) -> Result<PushOutcome> {
        let name = reference.to_string();
        match self.push(&reference).await {
            Ok(outcome) => {
                debug!(kind = %self.ctx.kind, item = %name, %outcome, "pushed");
                self.ctx.events.emit(SyncEvent::Pushed { name, outcome });
                Ok(outcome)
            }
            Err(e) if self.is_final(&e, attempt) => {
                error!(kind = %self.ctx.kind, item = %name, attempt, "push failed: {e}");
                self.ctx.events.emit(SyncEvent::PushedError {
                    name,
                    error: e.to_string(),
                });
                Err(e)
            }
            Err(e) => {
                debug!(kind = %self.ctx.kind, item = %name, attempt, "push will be retried: {e}");
                Err(e)
            }
        }
    }

    async fn push(&self, reference: &ArtifactRef) -> Result<PushOutcome> {
        let Some(location) = reference.location.as_deref() else {
            return Err(SyncError::Validation(format!(
                "{} item '{reference}' has no local file",
                self.ctx.kind
            )));
        };

        let mut artifact = self.local.get(location).await?;
        LocalItemStore::prune_for_push(&mut artifact);
        self.decorate(&mut artifact);

        let options = &self.ctx.options;
        let action = PushActionResolver::resolve(&artifact, options.create_only);
        if options.dry_run {
            return Ok(PushOutcome::WouldPush(action));
        }

        let write = WriteOptions {
            force_override: options.force_override,
        };
        let (saved, outcome) = match action {
            PushAction::Create => match self.remote.create(&creatable(&artifact), write).await {
                Ok(created) => (Some(created), PushOutcome::Created),
                Err(e) if e.is_conflict() && self.conflict_is_success() => {
                    debug!(kind = %self.ctx.kind, item = %reference, "item already exists");
                    (None, PushOutcome::ConflictIgnored)
                }
                Err(e) => return Err(e),
            },
            PushAction::Update => match self.remote.update(&artifact, write).await {
                Ok(updated) => (Some(updated), PushOutcome::Updated),
                Err(e) if e.is_not_found() => {
                    debug!(kind = %self.ctx.kind, item = %reference, "not on server, creating");
                    let created = self.remote.create(&creatable(&artifact), write).await?;
                    (Some(created), PushOutcome::RecreatedViaFallback)
                }
                Err(e) => return Err(e),
            },
        };

        let (id, remote_last_modified) = match &saved {
            Some(item) => {
                self.local.save(item, Some(location)).await?;
                (item.id().map(str::to_string), item.last_modified())
            }
            None => (artifact.id().map(str::to_string), None),
        };
        self.manifest
            .lock()
            .await
            .record_push(self.ctx.kind, location, id.as_deref(), remote_last_modified)
            .await;

        Ok(outcome)
    }

    const fn conflict_is_success(&self) -> bool {
        let options = &self.ctx.options;
        PushActionResolver::conflict_is_success(
            options.create_only,
            options.force_override,
            options.conflict_ignored_with_force_override,
        )
    }

    /// Apply the tag and library requested for this push
    fn decorate(&self, artifact: &mut Artifact) {
        let config = self.ctx.kind.config();
        if let Some(tag) = &self.ctx.options.set_tag {
            if config.supports_tags {
                artifact.add_tag(tag);
            }
        }
        if let Some(library) = &self.ctx.options.set_library {
            if config.supports_libraries {
                artifact.insert(LIBRARY_FIELD, library.clone().into());
            }
        }
    }

    /// Pull the remote artifact of `entry` into the working directory
    ///
    /// # Errors
    ///
    /// Returns the error of this attempt.
    pub async fn pull_item(&self, entry: WorkingEntry, attempt: u32) -> Result<PullOutcome> {
        let name = entry.reference.to_string();
        match self.pull(entry).await {
            Ok(outcome) => {
                match &outcome {
                    PullOutcome::PulledWithWarning { message, .. } => {
                        warn!(kind = %self.ctx.kind, item = %name, "{message}");
                        self.ctx.events.emit(SyncEvent::PulledWarning {
                            name,
                            message: message.clone(),
                        });
                    }
                    PullOutcome::Pulled(location) | PullOutcome::WouldPull(location) => {
                        debug!(kind = %self.ctx.kind, item = %name, location, "pulled");
                        self.ctx.events.emit(SyncEvent::Pulled { name });
                    }
                }
                Ok(outcome)
            }
            Err(e) if self.is_final(&e, attempt) => {
                error!(kind = %self.ctx.kind, item = %name, attempt, "pull failed: {e}");
                self.ctx.events.emit(SyncEvent::PulledError {
                    name,
                    error: e.to_string(),
                });
                Err(e)
            }
            Err(e) => {
                debug!(kind = %self.ctx.kind, item = %name, attempt, "pull will be retried: {e}");
                Err(e)
            }
        }
    }

    async fn pull(&self, entry: WorkingEntry) -> Result<PullOutcome> {
        let artifact = match entry.artifact {
            Some(artifact) => artifact,
            None => self.remote.get(&entry.reference).await?,
        };

        let location = match entry.reference.location {
            Some(location) => location,
            None => self.local.location_for(&artifact)?,
        };
        if self.ctx.options.dry_run {
            return Ok(PullOutcome::WouldPull(location));
        }

        self.local.save(&artifact, Some(&location)).await?;
        self.manifest
            .lock()
            .await
            .record_pull(
                self.ctx.kind,
                &location,
                artifact.id(),
                artifact.last_modified(),
            )
            .await;

        Ok(match digest_mismatch(&artifact) {
            Some(message) => PullOutcome::PulledWithWarning { location, message },
            None => PullOutcome::Pulled(location),
        })
    }
}

/// Body of a create request: the revision belongs to the server
fn creatable(artifact: &Artifact) -> Artifact {
    let mut body = artifact.clone();
    body.remove("rev");
    body
}

/// Compare a SHA-256 `digest` reported by the server with the content
///
/// Digests in other formats are not checked.
fn digest_mismatch(artifact: &Artifact) -> Option<String> {
    let digest = artifact.digest()?;
    let is_sha256 = digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit());
    if !is_sha256 {
        return None;
    }
    let actual = ContentHasher::hash_artifact(artifact);
    if actual.eq_ignore_ascii_case(digest) {
        None
    } else {
        Some(format!("digest mismatch: server {digest}, content {actual}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn artifact(value: serde_json::Value) -> Artifact {
        Artifact::from_value(value, "test").unwrap()
    }

    #[test]
    fn test_creatable_strips_rev() {
        let body = creatable(&artifact(json!({"id": "1", "rev": "3-abc", "name": "x"})));
        assert_eq!(body.rev(), None);
        assert_eq!(body.id(), Some("1"));
    }

    #[test]
    fn test_digest_mismatch() {
        let mut item = artifact(json!({"id": "1", "name": "x"}));
        assert!(digest_mismatch(&item).is_none());

        let good = ContentHasher::hash_artifact(&item);
        item.insert("digest", good.into());
        assert!(digest_mismatch(&item).is_none());

        item.insert("digest", "0".repeat(64).into());
        assert!(digest_mismatch(&item).unwrap().contains("digest mismatch"));

        item.insert("digest", "md5:abc".into());
        assert!(digest_mismatch(&item).is_none());
    }
}
