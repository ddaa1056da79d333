//! Storage abstraction trait
//!
//! This module defines the Storage trait that upload behaviors and the
//! thumbnail deriver use to place and read files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use stowage_core::AppError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Unable to create directory '{0}'")]
    DirectoryCreateFailed(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UploadFailed(msg) => AppError::SaveFailed(msg),
            StorageError::NotFound(key) => AppError::NotFound { name: key },
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::DirectoryCreateFailed(directory) => {
                AppError::DirectoryCreateFailed { directory }
            }
            StorageError::ConfigError(msg) => AppError::InvalidConfiguration(msg),
            StorageError::DownloadFailed(msg)
            | StorageError::DeleteFailed(msg)
            | StorageError::BackendError(msg) => AppError::Internal(msg),
            StorageError::IoError(e) => AppError::Internal(format!("IO error: {}", e)),
        }
    }
}

/// How a source file reaches its destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Rename, falling back to copy and remove across filesystems
    Move,
    /// Leave the source in place
    Copy,
}

/// Storage abstraction trait
///
/// Keys are relative links such as `original/post/0/0/0/image/1_abc.jpg`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Resolve a key to its filesystem path, rejecting keys that escape the base.
    fn resolve(&self, storage_key: &str) -> StorageResult<PathBuf>;

    /// Public URL for a key
    fn url_for(&self, storage_key: &str) -> String;

    /// Create the parent directory of a key, returning it.
    async fn ensure_dir_for(&self, storage_key: &str) -> StorageResult<PathBuf>;

    /// Place an existing file at a key. Returns the number of bytes stored.
    async fn store_file(
        &self,
        source: &Path,
        storage_key: &str,
        mode: TransferMode,
    ) -> StorageResult<u64>;

    /// Write bytes to a key so readers never observe a partial file.
    /// Returns the public URL.
    async fn upload_with_key(&self, storage_key: &str, data: Vec<u8>) -> StorageResult<String>;

    /// Download a file by its storage key
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Read at most `max_bytes` from the start of a file.
    async fn read_head(&self, storage_key: &str, max_bytes: usize) -> StorageResult<Vec<u8>> {
        let mut data = self.download(storage_key).await?;
        data.truncate(max_bytes);
        Ok(data)
    }

    /// Check if a regular file exists at a key. Directories do not count.
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Delete a file by its storage key. Missing files are not an error.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;
}
