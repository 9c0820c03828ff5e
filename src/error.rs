//! Error types for the chat client.

use std::path::PathBuf;

/// Errors from reading or writing a persisted blob.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors from a document upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("path has no file name: {0}")]
    MissingFileName(PathBuf),
    #[error("upload transport error: {0}")]
    Transport(String),
    #[error("upload failed with status {0}")]
    Status(u16),
}

/// Errors surfaced by a conversation turn or a listing request.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChatError::InvalidResponse(err.to_string())
        } else {
            ChatError::Transport(err.to_string())
        }
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        UploadError::Transport(err.to_string())
    }
}
