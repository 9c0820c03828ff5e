//! Document upload and listing against the assistant server

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::time::Duration;

use crate::config::Config;
use crate::error::{ChatError, UploadError};

/// Body of an upload request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub filename: String,
    /// RFC 3339 timestamp with millisecond precision
    pub date_of_creation: String,
    /// Standard base64 of the file bytes
    pub content: String,
}

impl UploadRequest {
    pub fn new(filename: impl Into<String>, bytes: &[u8], created_at: DateTime<Utc>) -> Self {
        Self {
            filename: filename.into(),
            date_of_creation: created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            content: STANDARD.encode(bytes),
        }
    }
}

/// A document known to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub name: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// Listing responses come either bare or wrapped in `files`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FileListing {
    Bare(Vec<UploadedFile>),
    Wrapped { files: Vec<UploadedFile> },
}

impl FileListing {
    fn into_files(self) -> Vec<UploadedFile> {
        match self {
            FileListing::Bare(files) | FileListing::Wrapped { files } => files,
        }
    }
}

/// Remote document storage
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn upload(&self, filename: &str, bytes: &[u8]) -> Result<UploadedFile, UploadError>;

    async fn list_files(&self) -> Result<Vec<UploadedFile>, ChatError>;
}

/// Read a local file and upload it under its own file name.
pub async fn upload_path(store: &dyn DocumentStore, path: &Path) -> Result<UploadedFile, UploadError> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| UploadError::MissingFileName(path.to_path_buf()))?
        .to_string();

    let bytes = tokio::fs::read(path).await.map_err(|source| UploadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    store.upload(&filename, &bytes).await
}

/// Document store reached over HTTP
#[derive(Clone)]
pub struct HttpDocumentStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDocumentStore {
    pub fn new(config: &Config) -> Result<Self, ChatError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        Ok(Self::with_client(&config.base_url, client))
    }

    pub fn with_client(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn upload(&self, filename: &str, bytes: &[u8]) -> Result<UploadedFile, UploadError> {
        let created_at = Utc::now();
        let payload = UploadRequest::new(filename, bytes, created_at);
        let url = format!("{}/upload-document", self.base_url);
        tracing::debug!(%url, filename, size = bytes.len(), "Uploading document");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), filename, "Upload rejected");
            return Err(UploadError::Status(status.as_u16()));
        }

        // The body is not part of the contract; pick up a link if one is offered.
        let body = response.text().await.unwrap_or_default();
        let link = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("link").and_then(|l| l.as_str()).map(str::to_string));

        tracing::info!(filename, size = bytes.len(), "Document uploaded");
        Ok(UploadedFile {
            name: filename.to_string(),
            link,
            size: bytes.len() as u64,
            created_at,
        })
    }

    async fn list_files(&self) -> Result<Vec<UploadedFile>, ChatError> {
        let url = format!("{}/uploaded-files", self.base_url);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let listing: FileListing = serde_json::from_str(&body)
            .map_err(|e| ChatError::InvalidResponse(e.to_string()))?;
        Ok(listing.into_files())
    }
}
