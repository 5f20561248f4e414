//! In-memory remote store
//!
//! Behaves like the REST endpoint closely enough for the engine: ids and
//! revisions are assigned by the store, creating an existing item conflicts,
//! updating a missing one is not found, and a stale `rev` conflicts unless
//! force override is set. Failures can be scripted per operation and item.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use super::remote::{RemoteItemStore, WriteOptions};
use crate::artifact::{Artifact, ArtifactRef};
use crate::error::{Result, SyncError};
use crate::kinds::ArtifactKind;

/// Remote operations, for call counting and failure scripting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// `list_all` or `list_modified_since`
    List,
    /// `get`
    Get,
    /// `create`
    Create,
    /// `update`
    Update,
}

#[derive(Debug)]
struct ScriptedFailure {
    op: StoreOp,
    key: Option<String>,
    status: Option<u16>,
    remaining: usize,
}

#[derive(Debug, Default)]
struct State {
    items: Vec<Artifact>,
    next_id: u64,
    clock: Option<DateTime<Utc>>,
    calls: HashMap<StoreOp, usize>,
    failures: Vec<ScriptedFailure>,
    received: Vec<(StoreOp, Artifact, WriteOptions)>,
}

impl State {
    fn position(&self, item: &ArtifactRef) -> Option<usize> {
        if let Some(id) = &item.id {
            return self.items.iter().position(|a| a.id() == Some(id.as_str()));
        }
        let path = item.path.as_deref()?;
        self.items.iter().position(|a| a.path() == Some(path))
    }

    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.clock {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.clock = Some(next);
        next
    }

    fn take_failure(&mut self, op: StoreOp, item: Option<&ArtifactRef>) -> Option<Option<u16>> {
        let index = self.failures.iter().position(|f| {
            f.op == op
                && f.remaining > 0
                && match (&f.key, item) {
                    (None, _) => true,
                    (Some(key), Some(item)) => item.matches(key),
                    (Some(_), None) => false,
                }
        })?;
        let failure = &mut self.failures[index];
        failure.remaining -= 1;
        Some(failure.status)
    }
}

fn next_rev(current: Option<&str>) -> String {
    let generation = current
        .and_then(|rev| rev.split('-').next())
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0);
    format!("{}-mem", generation + 1)
}

/// In-memory [`RemoteItemStore`]
///
/// Also serves as the remote of engines that only compute push working sets.
#[derive(Debug)]
pub struct MemoryItemStore {
    kind: ArtifactKind,
    state: Mutex<State>,
}

impl MemoryItemStore {
    /// Empty store for `kind`
    #[must_use]
    pub fn new(kind: ArtifactKind) -> Self {
        Self {
            kind,
            state: Mutex::new(State::default()),
        }
    }

    /// Store seeded with items, kept as given
    #[must_use]
    pub fn with_items(kind: ArtifactKind, items: Vec<Artifact>) -> Self {
        let store = Self::new(kind);
        store.state().items = items;
        store
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or replace an item directly, bypassing conflict checks
    pub fn put(&self, artifact: Artifact) {
        let mut state = self.state();
        let existing = state.position(&ArtifactRef::from_artifact(&artifact));
        match existing {
            Some(index) => state.items[index] = artifact,
            None => state.items.push(artifact),
        }
    }

    /// Simulate an edit made by someone else: bumps `rev` and `lastModified`
    pub fn touch(&self, id: &str, field: &str, value: Value) {
        let mut state = self.state();
        let now = state.tick();
        if let Some(index) = state.position(&ArtifactRef::with_id(id)) {
            let item = &mut state.items[index];
            let rev = next_rev(item.rev());
            item.insert(field, value);
            item.insert("rev", Value::String(rev));
            item.insert("lastModified", Value::String(now.to_rfc3339()));
        }
    }

    /// Snapshot of all items
    #[must_use]
    pub fn items(&self) -> Vec<Artifact> {
        self.state().items.clone()
    }

    /// Item matching a name, path or id
    #[must_use]
    pub fn find(&self, key: &str) -> Option<Artifact> {
        self.state()
            .items
            .iter()
            .find(|a| ArtifactRef::from_artifact(a).matches(key))
            .cloned()
    }

    /// Number of calls made for an operation
    #[must_use]
    pub fn calls(&self, op: StoreOp) -> usize {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of calls made for every operation
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.state().calls.values().sum()
    }

    /// Bodies received by create and update calls, in call order
    #[must_use]
    pub fn received(&self) -> Vec<(StoreOp, Artifact, WriteOptions)> {
        self.state().received.clone()
    }

    /// Fail the next `times` calls of `op` with an HTTP status
    ///
    /// `key` restricts the failure to the item with that name, path or id.
    /// 404 fails as not found, 409 as a conflict, `None` as a connection
    /// error and any other status as a transport error.
    pub fn fail(&self, op: StoreOp, key: Option<&str>, status: Option<u16>, times: usize) {
        self.state().failures.push(ScriptedFailure {
            op,
            key: key.map(str::to_string),
            status,
            remaining: times,
        });
    }

    fn begin(&self, op: StoreOp, item: Option<&ArtifactRef>) -> Result<MutexGuard<'_, State>> {
        let mut state = self.state();
        *state.calls.entry(op).or_default() += 1;

        let Some(status) = state.take_failure(op, item) else {
            return Ok(state);
        };
        let name = item.map(ToString::to_string).unwrap_or_default();
        Err(match status {
            Some(404) => SyncError::not_found(self.kind.service_name(), name),
            Some(409) => SyncError::Conflict {
                status: 409,
                name,
                message: "scripted conflict".to_string(),
            },
            other => SyncError::transport(other, "scripted failure"),
        })
    }
}

#[async_trait]
impl RemoteItemStore for MemoryItemStore {
    fn kind(&self) -> ArtifactKind {
        self.kind
    }

    async fn list_all(&self) -> Result<Vec<Artifact>> {
        let state = self.begin(StoreOp::List, None)?;
        Ok(state.items.clone())
    }

    async fn list_modified_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Artifact>> {
        let state = self.begin(StoreOp::List, None)?;
        Ok(state
            .items
            .iter()
            .filter(|item| match (since, item.last_modified()) {
                (Some(since), Some(ts)) => ts > since,
                _ => true,
            })
            .cloned()
            .collect())
    }

    async fn get(&self, item: &ArtifactRef) -> Result<Artifact> {
        let state = self.begin(StoreOp::Get, Some(item))?;
        state
            .position(item)
            .map(|index| state.items[index].clone())
            .ok_or_else(|| SyncError::not_found(self.kind.service_name(), item.to_string()))
    }

    async fn create(&self, artifact: &Artifact, options: WriteOptions) -> Result<Artifact> {
        let item_ref = ArtifactRef::from_artifact(artifact);
        let mut state = self.begin(StoreOp::Create, Some(&item_ref))?;
        state
            .received
            .push((StoreOp::Create, artifact.clone(), options));

        let id_taken = item_ref.id.is_some() && state.position(&item_ref).is_some();
        let path_taken = self.kind.config().is_path_based()
            && item_ref
                .path
                .as_deref()
                .is_some_and(|path| state.items.iter().any(|a| a.path() == Some(path)));
        if id_taken || path_taken {
            return Err(SyncError::Conflict {
                status: 409,
                name: item_ref.to_string(),
                message: "item already exists".to_string(),
            });
        }

        let mut created = artifact.clone();
        if created.id().is_none() {
            state.next_id += 1;
            created.set_id(format!("{}-{}", self.kind.service_name(), state.next_id));
        }
        let now = state.tick();
        created.insert("rev", Value::String(next_rev(None)));
        created.insert("created", Value::String(now.to_rfc3339()));
        created.insert("lastModified", Value::String(now.to_rfc3339()));
        state.items.push(created.clone());
        Ok(created)
    }

    async fn update(&self, artifact: &Artifact, options: WriteOptions) -> Result<Artifact> {
        let item_ref = ArtifactRef::from_artifact(artifact);
        let mut state = self.begin(StoreOp::Update, Some(&item_ref))?;
        state
            .received
            .push((StoreOp::Update, artifact.clone(), options));

        let index = match (&item_ref.id, state.position(&item_ref)) {
            (Some(_), Some(index)) => index,
            _ => {
                return Err(SyncError::not_found(
                    self.kind.service_name(),
                    item_ref.to_string(),
                ));
            }
        };

        let current_rev = state.items[index].rev().map(str::to_string);
        if !options.force_override {
            if let (Some(sent), Some(current)) = (artifact.rev(), current_rev.as_deref()) {
                if sent != current {
                    return Err(SyncError::Conflict {
                        status: 409,
                        name: item_ref.to_string(),
                        message: format!("revision {sent} is out of date, current is {current}"),
                    });
                }
            }
        }

        let now = state.tick();
        let mut updated = artifact.clone();
        if let Some(created) = state.items[index].get("created").cloned() {
            updated.insert("created", created);
        }
        updated.insert("rev", Value::String(next_rev(current_rev.as_deref())));
        updated.insert("lastModified", Value::String(now.to_rfc3339()));
        state.items[index] = updated.clone();
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn artifact(value: Value) -> Artifact {
        Artifact::from_value(value, "test").unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_rev() {
        let store = MemoryItemStore::new(ArtifactKind::Content);
        let created = store
            .create(&artifact(json!({"name": "Home"})), WriteOptions::default())
            .await
            .unwrap();

        assert_eq!(created.id(), Some("content-1"));
        assert_eq!(created.rev(), Some("1-mem"));
        assert!(created.last_modified().is_some());
        assert_eq!(store.calls(StoreOp::Create), 1);
    }

    #[tokio::test]
    async fn test_create_existing_conflicts() {
        let store = MemoryItemStore::with_items(
            ArtifactKind::Content,
            vec![artifact(json!({"id": "a", "name": "Home"}))],
        );
        let err = store
            .create(&artifact(json!({"id": "a"})), WriteOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_create_existing_path_conflicts() {
        let store = MemoryItemStore::with_items(
            ArtifactKind::Layouts,
            vec![artifact(json!({"id": "l1", "path": "/header"}))],
        );
        let err = store
            .create(&artifact(json!({"path": "/header"})), WriteOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = MemoryItemStore::new(ArtifactKind::Content);
        let err = store
            .update(&artifact(json!({"id": "gone"})), WriteOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_stale_rev_conflicts_unless_forced() {
        let store = MemoryItemStore::with_items(
            ArtifactKind::Content,
            vec![artifact(json!({"id": "a", "rev": "2-mem"}))],
        );
        let stale = artifact(json!({"id": "a", "rev": "1-mem"}));

        let err = store.update(&stale, WriteOptions::default()).await.unwrap_err();
        assert!(err.is_conflict());

        let forced = store
            .update(&stale, WriteOptions { force_override: true })
            .await
            .unwrap();
        assert_eq!(forced.rev(), Some("3-mem"));
    }

    #[tokio::test]
    async fn test_scripted_failures_run_out() {
        let store = MemoryItemStore::with_items(
            ArtifactKind::Content,
            vec![artifact(json!({"id": "a"}))],
        );
        store.fail(StoreOp::Get, Some("a"), Some(503), 1);

        let err = store.get(&ArtifactRef::with_id("a")).await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert!(store.get(&ArtifactRef::with_id("a")).await.is_ok());
        assert_eq!(store.calls(StoreOp::Get), 2);
    }

    #[tokio::test]
    async fn test_list_modified_since() {
        let store = MemoryItemStore::new(ArtifactKind::Content);
        store
            .create(&artifact(json!({"name": "old"})), WriteOptions::default())
            .await
            .unwrap();
        let cutoff = store.items()[0].last_modified();
        store
            .create(&artifact(json!({"name": "new"})), WriteOptions::default())
            .await
            .unwrap();

        let modified = store.list_modified_since(cutoff).await.unwrap();
        assert_eq!(modified.len(), 1);
        assert_eq!(modified[0].name(), Some("new"));
        assert_eq!(store.list_modified_since(None).await.unwrap().len(), 2);
    }

    #[test]
    fn test_next_rev() {
        assert_eq!(next_rev(None), "1-mem");
        assert_eq!(next_rev(Some("7-abc")), "8-mem");
        assert_eq!(next_rev(Some("garbage")), "1-mem");
    }
}
