//! Folder of JSON artifacts in the working directory

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::artifact::{Artifact, ArtifactRef};
use crate::config::PatternMatcher;
use crate::error::{Result, SyncError};
use crate::kinds::{ArtifactKind, ItemTypeConfig};

/// Fields dropped when an artifact is written to disk
const UNSTORED_FIELDS: [&str; 4] = ["links", "lastModifier", "lastModifierId", "lastModified"];

/// Local store for one artifact type
///
/// Id-based types live flat in `<working dir>/<folder>`; path-based types
/// nest their files so that the relative location mirrors the artifact path.
#[derive(Debug, Clone)]
pub struct LocalItemStore {
    kind: ArtifactKind,
    root: PathBuf,
    matcher: PatternMatcher,
}

impl LocalItemStore {
    /// Store for `kind` below `working_dir`
    #[must_use]
    pub fn new(working_dir: &Path, kind: ArtifactKind) -> Self {
        Self {
            kind,
            root: working_dir.join(kind.config().folder),
            matcher: PatternMatcher::new(),
        }
    }

    /// Apply ignore/include patterns to listings
    #[must_use]
    pub fn with_matcher(mut self, matcher: PatternMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Artifact type of this store
    #[must_use]
    pub const fn kind(&self) -> ArtifactKind {
        self.kind
    }

    fn config(&self) -> &'static ItemTypeConfig {
        self.kind.config()
    }

    /// Type folder
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the type folder exists
    pub async fn exists(&self) -> bool {
        tokio::fs::metadata(&self.root)
            .await
            .is_ok_and(|m| m.is_dir())
    }

    /// Absolute path of a location
    #[must_use]
    pub fn file_path(&self, location: &str) -> PathBuf {
        self.root.join(location)
    }

    /// List the artifacts stored locally, in directory order
    ///
    /// Each ref carries its location plus the id, name and status read from
    /// the file; files that fail to parse are still listed so that reading
    /// them reports the error. A missing folder lists as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be walked.
    pub async fn list_names(&self) -> Result<Vec<ArtifactRef>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.list_names_blocking())
            .await
            .map_err(|e| SyncError::Internal(format!("listing task failed: {e}")))?
    }

    fn list_names_blocking(&self) -> Result<Vec<ArtifactRef>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let config = self.config();
        let max_depth = if config.is_path_based() { usize::MAX } else { 1 };

        let mut refs = Vec::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                    return true;
                };
                self.matcher
                    .should_include(relative, entry.file_type().is_dir())
            });

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.root).to_path_buf();
                SyncError::io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(location) = self.relative_location(entry.path()) else {
                continue;
            };
            if !location.ends_with(config.extension) {
                continue;
            }

            refs.push(self.read_ref(entry.path(), location));
        }

        debug!(kind = %self.kind, count = refs.len(), "listed local artifacts");
        Ok(refs)
    }

    fn relative_location(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect();
        Some(parts.join("/"))
    }

    fn read_ref(&self, file: &Path, location: String) -> ArtifactRef {
        let mut item_ref = std::fs::read_to_string(file)
            .ok()
            .and_then(|text| Artifact::from_json(&text, &location).ok())
            .map(|artifact| ArtifactRef::from_artifact(&artifact))
            .unwrap_or_default();

        if self.config().is_path_based() {
            item_ref.path = Some(self.path_for_location(&location));
        }
        item_ref.at_location(location)
    }

    /// Artifact path encoded by a location of a path-based type
    #[must_use]
    pub fn path_for_location(&self, location: &str) -> String {
        let trimmed = location
            .strip_suffix(self.config().extension)
            .unwrap_or(location);
        format!("/{trimmed}")
    }

    /// Location an artifact would be saved to if it has no file yet
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] if the artifact has neither the
    /// path, id nor name needed to name the file.
    pub fn location_for(&self, artifact: &Artifact) -> Result<String> {
        let config = self.config();
        let stem = if config.is_path_based() {
            artifact
                .path()
                .map(|p| sanitize_path(p.trim_start_matches('/')))
                .or_else(|| artifact.name().map(sanitize_component))
        } else {
            artifact
                .id()
                .map(sanitize_component)
                .or_else(|| artifact.name().map(sanitize_component))
        };

        match stem {
            Some(stem) if !stem.is_empty() => Ok(format!("{stem}{}", config.extension)),
            _ => Err(SyncError::Validation(format!(
                "{} artifact has no path, id or name to store it under",
                self.kind
            ))),
        }
    }

    /// Read and parse the artifact at `location`
    ///
    /// For path-based types the `path` field is re-derived from the location,
    /// so moving a file is how an artifact is renamed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file is missing, `Io` on read failures and
    /// `Parse` if the file is not a JSON object.
    pub async fn get(&self, location: &str) -> Result<Artifact> {
        let file = self.file_path(location);
        let text = match tokio::fs::read_to_string(&file).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SyncError::not_found(self.config().service_name, location));
            }
            Err(e) => return Err(SyncError::io(&file, e)),
        };

        let mut artifact = Artifact::from_json(&text, &file.display().to_string())?;
        if self.config().is_path_based() {
            artifact.set_path(self.path_for_location(location));
        }
        Ok(artifact)
    }

    /// Write an artifact to `location` (or its derived location)
    ///
    /// Returns the location written.
    ///
    /// # Errors
    ///
    /// Returns an error if the location cannot be derived or the file
    /// cannot be written.
    pub async fn save(&self, artifact: &Artifact, location: Option<&str>) -> Result<String> {
        let location = match location {
            Some(location) => location.to_string(),
            None => self.location_for(artifact)?,
        };

        let mut stored = artifact.clone();
        self.prune_for_storage(&mut stored);
        let text = stored.to_pretty_json()?;

        let file = self.file_path(&location);
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::io(parent, e))?;
        }
        tokio::fs::write(&file, text)
            .await
            .map_err(|e| SyncError::io(&file, e))?;

        debug!(kind = %self.kind, location, "saved artifact");
        Ok(location)
    }

    /// Remove fields that are not stored on disk
    pub fn prune_for_storage(&self, artifact: &mut Artifact) {
        for field in UNSTORED_FIELDS {
            artifact.remove(field);
        }
        if self.config().is_path_based() {
            artifact.remove("path");
        }
    }

    /// Remove server-managed fields before sending an artifact
    pub fn prune_for_push(artifact: &mut Artifact) {
        artifact.strip_server_fields();
    }
}

/// Replace characters that are not valid in a file name
fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Sanitize every segment of a slash-separated path
fn sanitize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .map(sanitize_component)
        .collect::<Vec<_>>()
        .join("/")
}
