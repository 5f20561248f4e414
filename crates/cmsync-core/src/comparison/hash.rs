//! Content hashing using SHA-256

use std::fmt::Write;
use std::path::Path;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::artifact::Artifact;
use crate::error::{Result, SyncError};

/// Fields that change on every server round trip without changing content
const VOLATILE_FIELDS: [&str; 3] = ["digest", "links", "rev"];

/// Content hasher
pub struct ContentHasher;

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentHasher {
    /// Create a new content hasher
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Hex-encoded SHA-256 of a byte slice
    #[must_use]
    pub fn hash_bytes(bytes: &[u8]) -> String {
        let digest = Sha256::digest(bytes);
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        hex
    }

    /// Hash the raw contents of a file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub async fn hash_file(path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| SyncError::io(path, e))?;
        Ok(Self::hash_bytes(&bytes))
    }

    /// Hash an artifact's content, independent of key order and of the
    /// fields the server rewrites on every response
    #[must_use]
    pub fn hash_artifact(artifact: &Artifact) -> String {
        let mut content = artifact.as_map().clone();
        for field in VOLATILE_FIELDS {
            content.remove(field);
        }
        let canonical = canonical(Value::Object(content)).to_string();
        Self::hash_bytes(canonical.as_bytes())
    }
}

/// Rebuild objects with sorted keys so the serialization is stable
fn canonical(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, canonical(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonical).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_hash_identical_files() {
        let tmp = TempDir::new().unwrap();
        let file1 = tmp.path().join("file1.json");
        let file2 = tmp.path().join("file2.json");

        fs::write(&file1, "same content").unwrap();
        fs::write(&file2, "same content").unwrap();

        let hash1 = ContentHasher::hash_file(&file1).await.unwrap();
        let hash2 = ContentHasher::hash_file(&file2).await.unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[tokio::test]
    async fn test_hash_different_files() {
        let tmp = TempDir::new().unwrap();
        let file1 = tmp.path().join("file1.json");
        let file2 = tmp.path().join("file2.json");

        fs::write(&file1, "content 1").unwrap();
        fs::write(&file2, "content 2").unwrap();

        let hash1 = ContentHasher::hash_file(&file1).await.unwrap();
        let hash2 = ContentHasher::hash_file(&file2).await.unwrap();

        assert_ne!(hash1, hash2);
    }

    #[tokio::test]
    async fn test_hash_missing_file() {
        let tmp = TempDir::new().unwrap();
        let result = ContentHasher::hash_file(&tmp.path().join("missing.json")).await;
        assert!(matches!(result, Err(SyncError::Io { .. })));
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            ContentHasher::hash_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_artifact_hash_ignores_key_order_and_rev() {
        let a = Artifact::from_json(r#"{"name":"x","id":"1","rev":"3","body":"b"}"#, "a").unwrap();
        let b = Artifact::from_json(r#"{"body":"b","id":"1","name":"x","rev":"4"}"#, "b").unwrap();
        let c = Artifact::from_json(r#"{"body":"c","id":"1","name":"x"}"#, "c").unwrap();

        assert_eq!(ContentHasher::hash_artifact(&a), ContentHasher::hash_artifact(&b));
        assert_ne!(ContentHasher::hash_artifact(&a), ContentHasher::hash_artifact(&c));
    }
}
