//! Remote item store seam

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::artifact::{Artifact, ArtifactRef};
use crate::error::Result;
use crate::kinds::ArtifactKind;

/// Options for a single create or update call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Send `forceOverride=true` when the type supports it
    pub force_override: bool,
}

/// The remote endpoint of one artifact type
///
/// Implementations classify failures into [`SyncError`](crate::SyncError)
/// variants: a missing item is `NotFound`, an optimistic-concurrency
/// violation is `Conflict`, anything else on the wire is `Transport`.
#[async_trait]
pub trait RemoteItemStore: Send + Sync {
    /// Artifact type served by this store
    fn kind(&self) -> ArtifactKind;

    /// Every item of the type, in server order
    async fn list_all(&self) -> Result<Vec<Artifact>>;

    /// Items modified after `since`, or every item when `since` is `None`
    async fn list_modified_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Artifact>>;

    /// Fetch one item by id, or by path for path-based types without an id
    async fn get(&self, item: &ArtifactRef) -> Result<Artifact>;

    /// Create an item, returning the server's version of it
    async fn create(&self, artifact: &Artifact, options: WriteOptions) -> Result<Artifact>;

    /// Update an existing item, returning the server's version of it
    async fn update(&self, artifact: &Artifact, options: WriteOptions) -> Result<Artifact>;
}
