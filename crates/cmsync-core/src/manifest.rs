//! Persisted record of last-synced content hashes and timestamps
//!
//! One manifest lives in `<working dir>/.cmsync/hashes.json`. Entries are
//! keyed per artifact type by the file location relative to the type folder,
//! which is the local identity of an artifact. The manifest is read once when
//! an operation starts and written after every successful item. Write
//! failures are logged and never fail the operation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::comparison::{ContentHasher, TimestampComparator};
use crate::error::{Result, SyncError};
use crate::kinds::ArtifactKind;

/// Directory holding client state inside the working directory
pub const STATE_DIR: &str = ".cmsync";

/// Manifest file name inside [`STATE_DIR`]
pub const MANIFEST_FILE: &str = "hashes.json";

const MANIFEST_VERSION: u32 = 1;

/// Last known state of one local artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashEntry {
    /// Server id at the time of the last sync
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// SHA-256 of the file contents
    pub hash: String,
    /// File mtime when the hash was taken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<DateTime<Utc>>,
    /// Time of the last successful push
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_pushed: Option<DateTime<Utc>>,
    /// Time of the last successful pull
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_pulled: Option<DateTime<Utc>>,
    /// Remote `lastModified` seen by the last sync
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct KindEntries {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_pull: Option<DateTime<Utc>>,
    #[serde(default)]
    entries: BTreeMap<String, HashEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestFile {
    version: u32,
    #[serde(default)]
    kinds: BTreeMap<String, KindEntries>,
}

impl Default for ManifestFile {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            kinds: BTreeMap::new(),
        }
    }
}

/// Hash manifest of one working directory
#[derive(Debug)]
pub struct HashManifest {
    working_dir: PathBuf,
    path: PathBuf,
    data: ManifestFile,
}

impl HashManifest {
    /// Empty manifest for a working directory, nothing read from disk
    #[must_use]
    pub fn empty(working_dir: &Path) -> Self {
        Self {
            working_dir: working_dir.to_path_buf(),
            path: working_dir.join(STATE_DIR).join(MANIFEST_FILE),
            data: ManifestFile::default(),
        }
    }

    /// Load the manifest of a working directory
    ///
    /// A missing file yields an empty manifest. An unreadable or corrupt file
    /// is logged and also treated as empty, which makes every item modified.
    pub async fn load(working_dir: &Path) -> Self {
        let mut manifest = Self::empty(working_dir);

        let text = match tokio::fs::read_to_string(&manifest.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return manifest,
            Err(e) => {
                warn!(path = %manifest.path.display(), "failed to read hash manifest: {e}");
                return manifest;
            }
        };

        match serde_json::from_str::<ManifestFile>(&text) {
            Ok(data) if data.version == MANIFEST_VERSION => manifest.data = data,
            Ok(data) => warn!(
                version = data.version,
                "unsupported hash manifest version, starting from scratch"
            ),
            Err(e) => warn!(path = %manifest.path.display(), "corrupt hash manifest: {e}"),
        }
        manifest
    }

    /// Location of the manifest file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_path(&self, kind: ArtifactKind, location: &str) -> PathBuf {
        self.working_dir.join(kind.config().folder).join(location)
    }

    /// Entry for a local artifact
    #[must_use]
    pub fn entry(&self, kind: ArtifactKind, location: &str) -> Option<&HashEntry> {
        self.data
            .kinds
            .get(kind.service_name())
            .and_then(|k| k.entries.get(location))
    }

    /// Locations with an entry for a type
    #[must_use]
    pub fn locations(&self, kind: ArtifactKind) -> Vec<String> {
        self.data
            .kinds
            .get(kind.service_name())
            .map(|k| k.entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether a local file differs from what was last synced
    ///
    /// True when there is no entry, when the file is gone or unreadable, or
    /// when its hash changed. An unchanged mtime answers without hashing.
    pub async fn is_local_modified(&self, kind: ArtifactKind, location: &str) -> bool {
        let Some(entry) = self.entry(kind, location) else {
            return true;
        };
        let file = self.file_path(kind, location);

        let Ok(mtime) = TimestampComparator::modified_time(&file).await else {
            return true;
        };
        if entry.mtime == Some(mtime) {
            return false;
        }

        match ContentHasher::hash_file(&file).await {
            Ok(hash) => hash != entry.hash,
            Err(_) => true,
        }
    }

    /// Whether a remote artifact changed since it was last synced to `location`
    ///
    /// A missing or stale entry counts as modified.
    pub async fn is_remote_modified(
        &self,
        kind: ArtifactKind,
        location: &str,
        remote_last_modified: Option<DateTime<Utc>>,
    ) -> bool {
        let Some(entry) = self.entry(kind, location) else {
            return true;
        };
        if !tokio::fs::try_exists(self.file_path(kind, location))
            .await
            .unwrap_or(false)
        {
            return true;
        }
        TimestampComparator::is_newer(remote_last_modified, entry.remote_last_modified)
    }

    /// Time the last complete pull of a type started
    #[must_use]
    pub fn last_pull(&self, kind: ArtifactKind) -> Option<DateTime<Utc>> {
        self.data.kinds.get(kind.service_name()).and_then(|k| k.last_pull)
    }

    /// Record the start time of a complete pull and persist
    pub async fn set_last_pull(&mut self, kind: ArtifactKind, at: DateTime<Utc>) {
        self.data.kinds.entry(kind.service_name().to_string()).or_default().last_pull = Some(at);
        self.persist().await;
    }

    /// Record a successful push of the file at `location` and persist
    ///
    /// `remote_last_modified` is the timestamp of the item the server
    /// returned, so that the push itself is not seen as a remote change.
    /// Without one the previously recorded timestamp is kept.
    pub async fn record_push(
        &mut self,
        kind: ArtifactKind,
        location: &str,
        id: Option<&str>,
        remote_last_modified: Option<DateTime<Utc>>,
    ) {
        let Some(mut entry) = self.snapshot(kind, location).await else {
            return;
        };
        entry.id = id.map(str::to_string);
        entry.last_pushed = Some(Utc::now());
        if remote_last_modified.is_some() {
            entry.remote_last_modified = remote_last_modified;
        }
        self.insert(kind, location, entry);
        self.persist().await;
    }

    /// Record a successful pull into `location` and persist
    pub async fn record_pull(
        &mut self,
        kind: ArtifactKind,
        location: &str,
        id: Option<&str>,
        remote_last_modified: Option<DateTime<Utc>>,
    ) {
        let Some(mut entry) = self.snapshot(kind, location).await else {
            return;
        };
        entry.id = id.map(str::to_string);
        entry.last_pulled = Some(Utc::now());
        entry.remote_last_modified = remote_last_modified;
        self.insert(kind, location, entry);
        self.persist().await;
    }

    /// Hash and stat the file, carrying over timestamps of the previous entry
    async fn snapshot(&self, kind: ArtifactKind, location: &str) -> Option<HashEntry> {
        let file = self.file_path(kind, location);
        let hashed = async {
            let hash = ContentHasher::hash_file(&file).await?;
            let mtime = TimestampComparator::modified_time(&file).await?;
            Ok::<_, SyncError>((hash, mtime))
        };
        match hashed.await {
            Ok((hash, mtime)) => {
                let mut entry = self.entry(kind, location).cloned().unwrap_or_default();
                entry.hash = hash;
                entry.mtime = Some(mtime);
                Some(entry)
            }
            Err(e) => {
                warn!(%kind, location, "not recording hash: {e}");
                None
            }
        }
    }

    fn insert(&mut self, kind: ArtifactKind, location: &str, entry: HashEntry) {
        self.data
            .kinds
            .entry(kind.service_name().to_string())
            .or_default()
            .entries
            .insert(location.to_string(), entry);
    }

    /// Forget the entry for a location and persist
    pub async fn remove(&mut self, kind: ArtifactKind, location: &str) {
        let removed = self
            .data
            .kinds
            .get_mut(kind.service_name())
            .and_then(|k| k.entries.remove(location));
        if removed.is_some() {
            self.persist().await;
        }
    }

    /// Drop entries whose file no longer exists, returning their locations
    pub async fn prune_stale(&mut self, kind: ArtifactKind) -> Vec<String> {
        let mut stale = Vec::new();
        for location in self.locations(kind) {
            let exists = tokio::fs::try_exists(self.file_path(kind, &location))
                .await
                .unwrap_or(false);
            if !exists {
                stale.push(location);
            }
        }

        if !stale.is_empty() {
            if let Some(entries) = self.data.kinds.get_mut(kind.service_name()) {
                for location in &stale {
                    entries.entries.remove(location);
                }
            }
            self.persist().await;
        }
        stale
    }

    async fn persist(&self) {
        if let Err(e) = self.save().await {
            warn!("failed to persist hash manifest: {e}");
        }
    }

    /// Write the manifest to a temporary file and rename it into place
    ///
    /// # Errors
    ///
    /// Returns an error if the state directory or file cannot be written.
    pub async fn save(&self) -> Result<()> {
        let dir = self.working_dir.join(STATE_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| SyncError::io(&dir, e))?;

        let text = serde_json::to_string_pretty(&self.data)
            .map_err(|e| SyncError::Internal(format!("failed to serialize manifest: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, text)
            .await
            .map_err(|e| SyncError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| SyncError::io(&self.path, e))?;

        debug!(path = %self.path.display(), "hash manifest saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::fs;
    use tempfile::TempDir;

    const KIND: ArtifactKind = ArtifactKind::Content;

    fn write_item(tmp: &TempDir, location: &str, content: &str) {
        let dir = tmp.path().join(KIND.config().folder);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(location), content).unwrap();
    }

    #[tokio::test]
    async fn test_missing_manifest_is_empty() {
        let tmp = TempDir::new().unwrap();
        let manifest = HashManifest::load(tmp.path()).await;
        assert!(manifest.locations(KIND).is_empty());
        assert!(manifest.last_pull(KIND).is_none());
    }

    #[tokio::test]
    async fn test_corrupt_manifest_is_empty() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(STATE_DIR)).unwrap();
        fs::write(tmp.path().join(STATE_DIR).join(MANIFEST_FILE), "{not json").unwrap();

        let manifest = HashManifest::load(tmp.path()).await;
        assert!(manifest.locations(KIND).is_empty());
    }

    #[tokio::test]
    async fn test_no_entry_is_modified() {
        let tmp = TempDir::new().unwrap();
        write_item(&tmp, "a_cmd.json", "{}");
        let manifest = HashManifest::load(tmp.path()).await;
        assert!(manifest.is_local_modified(KIND, "a_cmd.json").await);
    }

    #[tokio::test]
    async fn test_record_push_then_unmodified() {
        let tmp = TempDir::new().unwrap();
        write_item(&tmp, "a_cmd.json", r#"{"id":"a"}"#);

        let mut manifest = HashManifest::load(tmp.path()).await;
        manifest.record_push(KIND, "a_cmd.json", Some("a"), None).await;

        assert!(!manifest.is_local_modified(KIND, "a_cmd.json").await);
        let entry = manifest.entry(KIND, "a_cmd.json").unwrap();
        assert_eq!(entry.id.as_deref(), Some("a"));
        assert!(entry.last_pushed.is_some());
    }

    #[tokio::test]
    async fn test_record_push_keeps_server_timestamp() {
        let tmp = TempDir::new().unwrap();
        write_item(&tmp, "a_cmd.json", r#"{"id":"a"}"#);
        let pulled_at = Utc::now() - Duration::days(1);
        let pushed_at = Utc::now();

        let mut manifest = HashManifest::load(tmp.path()).await;
        manifest.record_pull(KIND, "a_cmd.json", Some("a"), Some(pulled_at)).await;
        manifest.record_push(KIND, "a_cmd.json", Some("a"), Some(pushed_at)).await;
        assert!(!manifest.is_remote_modified(KIND, "a_cmd.json", Some(pushed_at)).await);

        // A response without a timestamp leaves the recorded one alone
        manifest.record_push(KIND, "a_cmd.json", Some("a"), None).await;
        let entry = manifest.entry(KIND, "a_cmd.json").unwrap();
        assert_eq!(entry.remote_last_modified, Some(pushed_at));
    }

    #[tokio::test]
    async fn test_content_change_is_modified() {
        let tmp = TempDir::new().unwrap();
        write_item(&tmp, "a_cmd.json", r#"{"id":"a"}"#);

        let mut manifest = HashManifest::load(tmp.path()).await;
        manifest.record_push(KIND, "a_cmd.json", Some("a"), None).await;

        write_item(&tmp, "a_cmd.json", r#"{"id":"a","title":"changed"}"#);
        assert!(manifest.is_local_modified(KIND, "a_cmd.json").await);
    }

    #[tokio::test]
    async fn test_touch_without_change_is_not_modified() {
        let tmp = TempDir::new().unwrap();
        write_item(&tmp, "a_cmd.json", r#"{"id":"a"}"#);

        let mut manifest = HashManifest::load(tmp.path()).await;
        manifest.record_push(KIND, "a_cmd.json", Some("a"), None).await;

        // Same bytes, possibly new mtime: falls through to the hash check.
        std::thread::sleep(std::time::Duration::from_millis(10));
        write_item(&tmp, "a_cmd.json", r#"{"id":"a"}"#);
        assert!(!manifest.is_local_modified(KIND, "a_cmd.json").await);
    }

    #[tokio::test]
    async fn test_manifest_persists_across_loads() {
        let tmp = TempDir::new().unwrap();
        write_item(&tmp, "a_cmd.json", r#"{"id":"a"}"#);
        let remote_ts = Utc::now();

        let mut manifest = HashManifest::load(tmp.path()).await;
        manifest.record_pull(KIND, "a_cmd.json", Some("a"), Some(remote_ts)).await;
        manifest.set_last_pull(KIND, remote_ts).await;
        assert!(tmp.path().join(STATE_DIR).join(MANIFEST_FILE).exists());
        assert!(!tmp.path().join(STATE_DIR).join("hashes.json.tmp").exists());

        let reloaded = HashManifest::load(tmp.path()).await;
        assert_eq!(reloaded.last_pull(KIND), Some(remote_ts));
        assert!(!reloaded.is_local_modified(KIND, "a_cmd.json").await);
        assert!(!reloaded.is_remote_modified(KIND, "a_cmd.json", Some(remote_ts)).await);
        assert!(
            reloaded
                .is_remote_modified(KIND, "a_cmd.json", Some(remote_ts + Duration::seconds(1)))
                .await
        );
    }

    #[tokio::test]
    async fn test_stale_entries_are_modified_and_pruned() {
        let tmp = TempDir::new().unwrap();
        write_item(&tmp, "a_cmd.json", "{}");
        write_item(&tmp, "b_cmd.json", "{}");

        let mut manifest = HashManifest::load(tmp.path()).await;
        manifest.record_pull(KIND, "a_cmd.json", None, None).await;
        manifest.record_pull(KIND, "b_cmd.json", None, None).await;

        fs::remove_file(tmp.path().join("content").join("b_cmd.json")).unwrap();
        assert!(manifest.is_remote_modified(KIND, "b_cmd.json", None).await);

        let pruned = manifest.prune_stale(KIND).await;
        assert_eq!(pruned, vec!["b_cmd.json".to_string()]);
        assert_eq!(manifest.locations(KIND), vec!["a_cmd.json".to_string()]);
    }

    #[tokio::test]
    async fn test_record_missing_file_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let mut manifest = HashManifest::load(tmp.path()).await;
        manifest.record_push(KIND, "ghost_cmd.json", None, None).await;
        assert!(manifest.entry(KIND, "ghost_cmd.json").is_none());
    }
}
