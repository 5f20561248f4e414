//! Timestamp handling for local files and remote artifacts

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::{Result, SyncError};

/// Timestamp comparator
pub struct TimestampComparator;

impl Default for TimestampComparator {
    fn default() -> Self {
        Self::new()
    }
}

impl TimestampComparator {
    /// Create a new timestamp comparator
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Parse an RFC 3339 timestamp as sent by the server
    #[must_use]
    pub fn parse(value: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Whether `candidate` is strictly newer than `recorded`
    ///
    /// Nothing recorded means newer; an unknown candidate is treated as
    /// newer too, since its recency cannot be proven.
    #[must_use]
    pub fn is_newer(candidate: Option<DateTime<Utc>>, recorded: Option<DateTime<Utc>>) -> bool {
        match (candidate, recorded) {
            (Some(candidate), Some(recorded)) => candidate > recorded,
            _ => true,
        }
    }

    /// Get the modification time of a file
    ///
    /// # Errors
    ///
    /// Returns an error if file metadata cannot be read.
    pub async fn modified_time(path: &Path) -> Result<DateTime<Utc>> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| SyncError::io(path, e))?;
        let modified = metadata.modified().map_err(|e| SyncError::io(path, e))?;
        Ok(DateTime::<Utc>::from(modified))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse() {
        let ts = TimestampComparator::parse("2024-05-01T12:00:00+02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert!(TimestampComparator::parse("not a date").is_none());
    }

    #[test]
    fn test_is_newer() {
        let now = Utc::now();
        let earlier = now - Duration::seconds(5);

        assert!(TimestampComparator::is_newer(Some(now), Some(earlier)));
        assert!(!TimestampComparator::is_newer(Some(earlier), Some(now)));
        assert!(!TimestampComparator::is_newer(Some(now), Some(now)));
        assert!(TimestampComparator::is_newer(Some(now), None));
        assert!(TimestampComparator::is_newer(None, Some(now)));
    }

    #[tokio::test]
    async fn test_modified_time() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("file.json");
        fs::write(&file, "{}").unwrap();

        let time = TimestampComparator::modified_time(&file).await.unwrap();
        assert!(time <= Utc::now() + Duration::seconds(1));
    }

    #[tokio::test]
    async fn test_nonexistent_file() {
        let tmp = TempDir::new().unwrap();
        let result = TimestampComparator::modified_time(&tmp.path().join("nope.json")).await;
        assert!(result.is_err());
    }
}
