//! Artifact documents and lightweight references to them

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SyncError};

/// Fields maintained by the server that are never pushed back
pub const SERVER_MANAGED_FIELDS: [&str; 6] = [
    "created",
    "creator",
    "creatorId",
    "lastModifier",
    "lastModifierId",
    "lastModified",
];

/// A JSON artifact document
///
/// Only the identity and concurrency fields are interpreted; every other
/// field is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Artifact(Map<String, Value>);

impl Artifact {
    /// Create an empty artifact
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Parse an artifact from JSON text
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Parse`] if the text is not a JSON object.
    pub fn from_json(text: &str, origin: &str) -> Result<Self> {
        serde_json::from_str::<Self>(text).map_err(|e| SyncError::Parse {
            origin: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Build an artifact from a JSON value
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Parse`] if the value is not an object.
    pub fn from_value(value: Value, origin: &str) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(SyncError::Parse {
                origin: origin.to_string(),
                message: format!("expected a JSON object, found {}", type_name(&other)),
            }),
        }
    }

    /// Serialize as pretty-printed JSON with a trailing newline
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Internal`] if serialization fails.
    pub fn to_pretty_json(&self) -> Result<String> {
        let mut text = serde_json::to_string_pretty(&self.0)
            .map_err(|e| SyncError::Internal(format!("failed to serialize artifact: {e}")))?;
        text.push('\n');
        Ok(text)
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Server-assigned id
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.str_field("id").filter(|id| !id.is_empty())
    }

    /// Display name
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    /// Hierarchical path of path-addressed types
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.str_field("path")
    }

    /// Revision token
    #[must_use]
    pub fn rev(&self) -> Option<&str> {
        self.str_field("rev")
    }

    /// Ready/draft status of versioned types
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.str_field("status")
    }

    /// Server-side content digest
    #[must_use]
    pub fn digest(&self) -> Option<&str> {
        self.str_field("digest")
    }

    /// Remote modification timestamp
    #[must_use]
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.str_field("lastModified")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// A name usable in messages: name, then path, then id
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name()
            .or_else(|| self.path())
            .or_else(|| self.id())
            .unwrap_or("<unnamed>")
    }

    /// Set the id
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.0.insert("id".to_string(), Value::String(id.into()));
    }

    /// Set the path
    pub fn set_path(&mut self, path: impl Into<String>) {
        self.0.insert("path".to_string(), Value::String(path.into()));
    }

    /// Get a raw field
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Insert a raw field, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Remove a raw field
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Remove every server-managed field
    pub fn strip_server_fields(&mut self) {
        for field in SERVER_MANAGED_FIELDS {
            self.0.remove(field);
        }
    }

    /// Add `tag` unless it is already present, plain or as `user:<tag>`
    ///
    /// Returns true if the tag list changed.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let user_tag = format!("user:{tag}");
        let tags = self
            .0
            .entry("tags")
            .or_insert_with(|| Value::Array(Vec::new()));

        if !tags.is_array() {
            *tags = Value::Array(Vec::new());
        }
        let Value::Array(list) = tags else {
            return false;
        };

        let present = list
            .iter()
            .filter_map(Value::as_str)
            .any(|t| t == tag || t == user_tag);
        if present {
            return false;
        }
        list.push(Value::String(tag.to_string()));
        true
    }

    /// Borrow the underlying JSON object
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume into the underlying JSON object
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Artifact {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Reference to an artifact in a working set
///
/// Local refs carry the relative file location; remote refs carry whatever
/// the listing returned.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArtifactRef {
    /// Server id
    pub id: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Hierarchical path (path-based types)
    pub path: Option<String>,
    /// File location relative to the type folder, including the extension
    pub location: Option<String>,
    /// Ready/draft status
    pub status: Option<String>,
    /// Remote modification timestamp reported by a listing
    pub last_modified: Option<DateTime<Utc>>,
}

impl ArtifactRef {
    /// Build a reference from a full artifact
    #[must_use]
    pub fn from_artifact(artifact: &Artifact) -> Self {
        Self {
            id: artifact.id().map(str::to_string),
            name: artifact.name().map(str::to_string),
            path: artifact.path().map(str::to_string),
            location: None,
            status: artifact.status().map(str::to_string),
            last_modified: artifact.last_modified(),
        }
    }

    /// Reference by id only
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Reference by path only
    #[must_use]
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Attach a local file location
    #[must_use]
    pub fn at_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Stable identity key: id, else path, else name
    #[must_use]
    pub fn key(&self) -> String {
        self.id
            .as_deref()
            .or(self.path.as_deref())
            .or(self.name.as_deref())
            .unwrap_or_default()
            .to_string()
    }

    /// Whether `needle` equals the name, path or id of this artifact
    ///
    /// Paths match with or without the leading slash.
    #[must_use]
    pub fn matches(&self, needle: &str) -> bool {
        if self.name.as_deref() == Some(needle) || self.id.as_deref() == Some(needle) {
            return true;
        }
        self.path
            .as_deref()
            .is_some_and(|path| path.trim_start_matches('/') == needle.trim_start_matches('/'))
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self
            .name
            .as_deref()
            .or(self.path.as_deref())
            .or(self.location.as_deref())
            .or(self.id.as_deref())
            .unwrap_or("<unnamed>");
        f.write_str(label)
    }
}
