//! REST endpoint of one artifact type

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::remote::{RemoteItemStore, WriteOptions};
use crate::artifact::{Artifact, ArtifactRef};
use crate::error::{Result, SyncError};
use crate::kinds::{ArtifactKind, ItemTypeConfig};

/// Page size for list requests
const PAGE_SIZE: usize = 100;

/// Error code the server reports for a draft revision conflict
const DRAFT_CONFLICT_CODE: i64 = 3002;

/// Basic-auth credentials
#[derive(Clone)]
pub struct Credentials {
    /// User name
    pub username: String,
    /// Password
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    items: Vec<Value>,
}

/// Whether a failed write response is an optimistic-concurrency conflict
///
/// Ready items conflict with 409. Draft items conflict with 400 and an
/// error entry whose code is 3002.
#[must_use]
pub fn is_conflict_response(status: u16, body: &Value) -> bool {
    if status == 409 {
        return true;
    }
    status == 400
        && body
            .get("errors")
            .and_then(Value::as_array)
            .is_some_and(|errors| {
                errors
                    .iter()
                    .any(|e| e.get("code").and_then(Value::as_i64) == Some(DRAFT_CONFLICT_CODE))
            })
}

/// Pull a readable message out of an error body
fn error_message(status: StatusCode, body: &Value, raw: &str) -> String {
    let described = body
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
        .and_then(|e| e.get("message").or_else(|| e.get("description")))
        .and_then(Value::as_str)
        .or_else(|| body.get("message").and_then(Value::as_str));

    match described {
        Some(message) => format!("HTTP {status}: {message}"),
        None if raw.trim().is_empty() => format!("HTTP {status}"),
        None => format!("HTTP {status}: {}", raw.trim()),
    }
}

/// Remote store backed by the content hub REST API
#[derive(Debug, Clone)]
pub struct RestItemStore {
    kind: ArtifactKind,
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl RestItemStore {
    /// Create a store for `kind` below `base_url`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(
        kind: ArtifactKind,
        base_url: &str,
        credentials: Option<Credentials>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(kind, client, base_url, credentials))
    }

    /// Create a store sharing an existing HTTP client
    #[must_use]
    pub fn with_client(
        kind: ArtifactKind,
        client: Client,
        base_url: &str,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            kind,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn config(&self) -> &'static ItemTypeConfig {
        self.kind.config()
    }

    fn uri(&self, suffix: &str) -> String {
        format!("{}{}{}", self.base_url, self.config().uri_path, suffix)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(c) => request.basic_auth(&c.username, Some(&c.password)),
            None => request,
        }
    }

    async fn list_pages(&self, suffix: &str) -> Result<Vec<Artifact>> {
        let url = self.uri(suffix);
        let mut items = Vec::new();
        let mut offset = 0;

        loop {
            debug!(url = %url, offset, "listing remote items");
            let request = self.authorize(self.client.get(&url)).query(&[
                ("offset", offset.to_string()),
                ("limit", PAGE_SIZE.to_string()),
            ]);
            let response = request.send().await?;
            let response = self.check(response, &url).await?;

            let page: ListPage = response.json().await?;
            let count = page.items.len();
            for value in page.items {
                items.push(Artifact::from_value(value, &url)?);
            }

            if count < PAGE_SIZE {
                break;
            }
            offset += count;
        }

        Ok(items)
    }

    /// Turn a non-success response into an error
    async fn check(&self, response: Response, name: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(self.classify(response, name).await)
    }

    async fn classify(&self, response: Response, name: &str) -> SyncError {
        let status = response.status();
        let raw = response.text().await.unwrap_or_default();
        let body: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);

        if status == StatusCode::NOT_FOUND {
            return SyncError::not_found(self.config().service_name, name);
        }
        if is_conflict_response(status.as_u16(), &body) {
            return SyncError::Conflict {
                status: status.as_u16(),
                name: name.to_string(),
                message: error_message(status, &body, &raw),
            };
        }
        SyncError::transport(Some(status.as_u16()), error_message(status, &body, &raw))
    }

    async fn read_item(&self, response: Response, fallback: &Artifact, origin: &str) -> Result<Artifact> {
        let raw = response.text().await?;
        if raw.trim().is_empty() {
            return Ok(fallback.clone());
        }
        Artifact::from_json(&raw, origin)
    }

    fn write_query(&self, options: WriteOptions, on_create: bool) -> Vec<(&'static str, &'static str)> {
        let config = self.config();
        let supported = if on_create {
            config.force_override_on_create
        } else {
            config.force_override
        };
        if options.force_override && supported {
            vec![("forceOverride", "true")]
        } else {
            Vec::new()
        }
    }
}

#[async_trait]
impl RemoteItemStore for RestItemStore {
    fn kind(&self) -> ArtifactKind {
        self.kind
    }

    async fn list_all(&self) -> Result<Vec<Artifact>> {
        self.list_pages(self.config().all_uri_suffix).await
    }

    async fn list_modified_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Artifact>> {
        let items = self.list_pages(self.config().modified_uri_suffix).await?;
        let Some(since) = since else {
            return Ok(items);
        };
        Ok(items
            .into_iter()
            .filter(|item| item.last_modified().is_none_or(|ts| ts > since))
            .collect())
    }

    async fn get(&self, item: &ArtifactRef) -> Result<Artifact> {
        let request = match (&item.id, &item.path) {
            (Some(id), _) => self.client.get(self.uri(&format!("/{id}"))),
            (None, Some(path)) if self.config().is_path_based() => self
                .client
                .get(self.uri("/by-path"))
                .query(&[("path", path.as_str())]),
            _ => {
                return Err(SyncError::Validation(format!(
                    "{} item '{item}' has no id to fetch it by",
                    self.kind
                )));
            }
        };

        let name = item.to_string();
        debug!(kind = %self.kind, item = %name, "fetching remote item");
        let response = self.authorize(request).send().await?;
        let response = self.check(response, &name).await?;
        let value: Value = response.json().await?;
        Artifact::from_value(value, &name)
    }

    async fn create(&self, artifact: &Artifact, options: WriteOptions) -> Result<Artifact> {
        let url = self.uri("");
        let name = artifact.display_name().to_string();
        debug!(kind = %self.kind, item = %name, "creating remote item");

        let request = self
            .authorize(self.client.post(&url))
            .query(&self.write_query(options, true))
            .json(artifact);
        let response = request.send().await?;
        let response = self.check(response, &name).await?;
        self.read_item(response, artifact, &url).await
    }

    async fn update(&self, artifact: &Artifact, options: WriteOptions) -> Result<Artifact> {
        let name = artifact.display_name().to_string();
        let Some(id) = artifact.id() else {
            return Err(SyncError::Validation(format!(
                "cannot update {} item '{name}' without an id",
                self.kind
            )));
        };
        let url = self.uri(&format!("/{id}"));
        debug!(kind = %self.kind, item = %name, "updating remote item");

        let request = self
            .authorize(self.client.put(&url))
            .query(&self.write_query(options, false))
            .json(artifact);
        let response = request.send().await?;
        let response = self.check(response, &name).await?;
        self.read_item(response, artifact, &url).await
    }
}
