use crate::traits::{Storage, StorageError, StorageResult, TransferMode};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

/// Local filesystem storage implementation
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for uploads (e.g., "/var/www/uploads")
    /// * `base_url` - Base URL for serving files (e.g., "https://cdn.example.com/uploads")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// Rejects parent-directory segments and absolute keys, and keys whose
    /// nearest existing ancestor resolves outside the base directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.is_empty() || storage_key.starts_with('/') {
            return Err(StorageError::InvalidKey(
                "Storage key must be a non-empty relative path".to_string(),
            ));
        }

        let relative = Path::new(storage_key);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        let path = self.base_path.join(relative);

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        let mut existing = path.as_path();
        while !existing.exists() {
            match existing.parent() {
                Some(parent) => existing = parent,
                None => break,
            }
        }

        if let Ok(canonical) = existing.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    /// Generate public URL for file
    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}

async fn create_dir_all(path: &Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o777);
    builder.create(path).await
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

async fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn resolve(&self, storage_key: &str) -> StorageResult<PathBuf> {
        self.key_to_path(storage_key)
    }

    fn url_for(&self, storage_key: &str) -> String {
        self.generate_url(storage_key)
    }

    async fn ensure_dir_for(&self, storage_key: &str) -> StorageResult<PathBuf> {
        let path = self.key_to_path(storage_key)?;
        let dir = path.parent().unwrap_or(&self.base_path).to_path_buf();

        create_dir_all(&dir).await.map_err(|e| {
            tracing::error!(
                directory = %dir.display(),
                error = %e,
                "Failed to create upload directory"
            );
            StorageError::DirectoryCreateFailed(dir.display().to_string())
        })?;

        Ok(dir)
    }

    async fn store_file(
        &self,
        source: &Path,
        storage_key: &str,
        mode: TransferMode,
    ) -> StorageResult<u64> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        if is_same_file(source, &path).await {
            let meta = fs::metadata(&path).await?;
            return Ok(meta.len());
        }

        let size = match mode {
            TransferMode::Move => match fs::rename(source, &path).await {
                Ok(()) => fs::metadata(&path).await?.len(),
                Err(rename_err) => {
                    tracing::debug!(
                        source = %source.display(),
                        error = %rename_err,
                        "Rename failed, falling back to copy"
                    );
                    let copied = fs::copy(source, &path).await.map_err(|e| {
                        StorageError::UploadFailed(format!(
                            "Failed to move {} to {}: {}",
                            source.display(),
                            path.display(),
                            e
                        ))
                    })?;
                    if let Err(e) = fs::remove_file(source).await {
                        tracing::warn!(
                            source = %source.display(),
                            error = %e,
                            "Failed to remove source after copy"
                        );
                    }
                    copied
                }
            },
            TransferMode::Copy => fs::copy(source, &path).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to copy {} to {}: {}",
                    source.display(),
                    path.display(),
                    e
                ))
            })?,
        };

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = size,
            mode = ?mode,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage store_file successful"
        );

        Ok(size)
    }

    async fn upload_with_key(&self, storage_key: &str, data: Vec<u8>) -> StorageResult<String> {
        let path = self.key_to_path(storage_key)?;
        let size = data.len();

        let dir = self.ensure_dir_for(storage_key).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = dir.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to create file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        let written = async {
            file.write_all(&data).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to write file {}: {}",
                temp_path.display(),
                e
            )));
        }

        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            )));
        }

        let url = self.generate_url(storage_key);

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload_with_key successful"
        );

        Ok(url)
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        if !is_file(&path).await {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }

        let data = fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage download successful"
        );

        Ok(data)
    }

    async fn read_head(&self, storage_key: &str, max_bytes: usize) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(storage_key)?;

        if !is_file(&path).await {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }

        let read_err = |e: std::io::Error| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        };

        let file = fs::File::open(&path).await.map_err(read_err)?;
        let mut data = Vec::with_capacity(max_bytes.min(64 * 1024));
        file.take(max_bytes as u64)
            .read_to_end(&mut data)
            .await
            .map_err(read_err)?;

        Ok(data)
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key)?;
        Ok(is_file(&path).await)
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }
}
