use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid storage path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete file '{path}': {source}")]
    DeleteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stored object not found: {0}")]
    NotFound(String),

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}

/// A container of named byte streams.
///
/// `path` is a flat object name within the backend's container.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Stores `bytes` under `path`, replacing any existing object, and returns
    /// the locator URI of the stored object.
    async fn store(&self, bytes: &[u8], path: &str, content_type: &str)
        -> Result<String, StorageError>;

    async fn fetch(&self, path: &str, content_type: &str) -> Result<Vec<u8>, StorageError>;

    /// Removes `path`. Removing an object that does not exist succeeds.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}
