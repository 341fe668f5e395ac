//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Copy failed: {0}")]
    CopyFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Invalid storage reference: {0}")]
    InvalidReference(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem) implement this trait. Every
/// operation addresses a single object; no backend offers a multi-object
/// transaction or an atomic cross-namespace rename, so callers that move
/// objects copy first and delete second.
///
/// **Key format:** see the crate root documentation.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write data to a specific storage key and return its public URL.
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String>;

    /// Download a file by its storage key
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Copy a file from one key to another, returning the destination's public URL.
    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<String>;

    /// Delete a file by its storage key. Deleting a missing key is not an error.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Delete several files, one request each. Stops at the first failure.
    async fn remove(&self, storage_keys: &[String]) -> StorageResult<()> {
        for key in storage_keys {
            self.delete(key).await?;
        }
        Ok(())
    }

    /// Check if a file exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Root that every public URL of this backend starts with, without a trailing slash.
    fn base_url(&self) -> String;

    /// Public URL of a key. Pure: performs no I/O and does not check existence.
    fn public_url(&self, storage_key: &str) -> String {
        crate::keys::public_url(&self.base_url(), storage_key)
    }

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
