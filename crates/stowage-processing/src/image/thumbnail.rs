//! On-demand thumbnail derivation
//!
//! A thumbnail of `{width}x{height}` for a link is stored at
//! `{width}x{height}/{link}` next to the `{original_folder}/{link}` original.
//! It is generated on first request and served from disk afterwards. A zero
//! width or height is filled in from the original's aspect ratio.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use image::imageops::FilterType;
use stowage_core::{AppError, Config};
use stowage_storage::Storage;

use super::processor::ImageProcessor;

/// Largest width or height derived unless configured otherwise
pub const DEFAULT_MAX_DIMENSION: u32 = 4096;

const HEADER_READ_BYTES: usize = 64 * 1024;

/// A derived image variant
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub bytes: Bytes,
    pub content_type: String,
    /// Filesystem path of the stored variant
    pub path: PathBuf,
    /// Whether this call produced the variant
    pub generated: bool,
}

#[derive(Clone)]
pub struct ThumbnailDeriver {
    storage: Arc<dyn Storage>,
    original_folder: String,
    sizes: Vec<String>,
    max_dimension: u32,
}

impl ThumbnailDeriver {
    pub fn new(
        storage: Arc<dyn Storage>,
        original_folder: impl Into<String>,
        sizes: Vec<String>,
    ) -> Self {
        Self {
            storage,
            original_folder: original_folder.into(),
            sizes,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    pub fn from_config(storage: Arc<dyn Storage>, config: &Config) -> Self {
        Self::new(
            storage,
            config.original_folder(),
            config.thumbnail_sizes().to_vec(),
        )
        .with_max_dimension(config.max_thumbnail_dimension())
    }

    /// Reject thumbnails whose width or height would exceed `max_dimension`.
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    /// An empty allow-list permits every size.
    pub fn is_size_allowed(&self, width: u32, height: u32) -> bool {
        self.sizes.is_empty() || self.sizes.contains(&format!("{}x{}", width, height))
    }

    pub fn original_key(&self, link: &str) -> String {
        format!("{}/{}", self.original_folder, link)
    }

    pub fn variant_key(width: u32, height: u32, link: &str) -> String {
        format!("{}x{}/{}", width, height, link)
    }

    /// Fill in a zero dimension so the variant keeps the original's aspect ratio.
    pub fn target_dimensions(
        width: u32,
        height: u32,
        original_width: u32,
        original_height: u32,
    ) -> (u32, u32) {
        let (ow, oh) = (
            u64::from(original_width.max(1)),
            u64::from(original_height.max(1)),
        );
        let clamp = |value: u64| value.clamp(1, u64::from(u32::MAX)) as u32;

        match (width, height) {
            (w, 0) => (w, clamp((u64::from(w) * oh).div_ceil(ow))),
            (0, h) => (clamp((u64::from(h) * ow).div_ceil(oh)), h),
            (w, h) => (w, h),
        }
    }

    /// Read the original's dimensions from its header. The whole file is
    /// returned only when the header did not fit in the first read.
    async fn original_dimensions(
        &self,
        original_key: &str,
        name: &str,
    ) -> Result<(u32, u32, Option<Vec<u8>>), AppError> {
        let head = self.storage.read_head(original_key, HEADER_READ_BYTES).await?;
        if let Some((w, h)) = ImageProcessor::get_dimensions(&head) {
            return Ok((w, h, None));
        }

        if head.len() < HEADER_READ_BYTES {
            return Err(AppError::NotAnImage {
                name: name.to_string(),
            });
        }

        let original = self.storage.download(original_key).await?;
        match ImageProcessor::get_dimensions(&original) {
            Some((w, h)) => Ok((w, h, Some(original))),
            None => Err(AppError::NotAnImage {
                name: name.to_string(),
            }),
        }
    }

    /// Return the `{width}x{height}` variant of `link`, generating it if needed.
    #[tracing::instrument(skip(self), fields(operation = "derive_thumbnail"))]
    pub async fn derive(&self, width: u32, height: u32, link: &str) -> Result<Thumbnail, AppError> {
        if (width > 0 || height > 0) && !self.is_size_allowed(width, height) {
            return Err(AppError::SizeNotAllowed { width, height });
        }

        if width == 0 && height == 0 {
            return Err(AppError::DimensionsRequired);
        }

        if width > self.max_dimension || height > self.max_dimension {
            return Err(AppError::SizeNotAllowed { width, height });
        }

        let name = link.rsplit('/').next().unwrap_or(link).to_string();
        let original_key = self.original_key(link);

        if !self.storage.exists(&original_key).await? {
            return Err(AppError::NotFound { name });
        }

        let (original_width, original_height, original) =
            self.original_dimensions(&original_key, &name).await?;

        let (target_width, target_height) =
            Self::target_dimensions(width, height, original_width, original_height);
        if target_width > self.max_dimension || target_height > self.max_dimension {
            tracing::warn!(
                link = %link,
                target_width,
                target_height,
                max = self.max_dimension,
                "Derived thumbnail dimension exceeds the maximum"
            );
            return Err(AppError::SizeNotAllowed { width, height });
        }

        let variant_key = Self::variant_key(width, height, link);
        let path = self.storage.resolve(&variant_key)?;

        if self.storage.exists(&variant_key).await? {
            let data = self.storage.download(&variant_key).await?;
            let content_type = ImageProcessor::detect_format(&data)
                .map(ImageProcessor::content_type)
                .unwrap_or("application/octet-stream");

            tracing::debug!(key = %variant_key, "Serving existing thumbnail");

            return Ok(Thumbnail {
                bytes: Bytes::from(data),
                content_type: content_type.to_string(),
                path,
                generated: false,
            });
        }

        let original = match original {
            Some(data) => data,
            None => self.storage.download(&original_key).await?,
        };

        self.storage.ensure_dir_for(&variant_key).await?;

        let start = std::time::Instant::now();

        let (data, content_type) = tokio::task::spawn_blocking(move || {
            let format = ImageProcessor::detect_format(&original).ok_or_else(|| {
                AppError::ImageProcessing("Unable to detect image format".to_string())
            })?;
            let img = ImageProcessor::decode(&original)?;
            let resized = img.resize_to_fill(target_width, target_height, FilterType::Lanczos3);
            let data = ImageProcessor::encode(&resized, format)?;
            Ok::<_, AppError>((data, ImageProcessor::content_type(format)))
        })
        .await
        .map_err(|e| AppError::Internal(format!("Thumbnail task failed: {}", e)))??;

        let size = data.len();
        let bytes = Bytes::from(data);
        self.storage
            .upload_with_key(&variant_key, bytes.to_vec())
            .await?;

        tracing::info!(
            link = %link,
            key = %variant_key,
            width = target_width,
            height = target_height,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Thumbnail generated"
        );

        Ok(Thumbnail {
            bytes,
            content_type: content_type.to_string(),
            path,
            generated: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_images::{jpeg_image, png_image};
    use stowage_storage::LocalStorage;
    use tempfile::{tempdir, TempDir};

    async fn deriver_with(sizes: &[&str]) -> (TempDir, Arc<LocalStorage>, ThumbnailDeriver) {
        let dir = tempdir().unwrap();
        let storage = Arc::new(
            LocalStorage::new(dir.path(), "/uploads".to_string())
                .await
                .unwrap(),
        );
        let deriver = ThumbnailDeriver::new(
            storage.clone(),
            "original",
            sizes.iter().map(|s| s.to_string()).collect(),
        );
        (dir, storage, deriver)
    }

    #[test]
    fn test_target_dimensions() {
        assert_eq!(ThumbnailDeriver::target_dimensions(800, 0, 1600, 900), (800, 450));
        assert_eq!(ThumbnailDeriver::target_dimensions(0, 450, 1600, 900), (800, 450));
        assert_eq!(ThumbnailDeriver::target_dimensions(100, 0, 300, 100), (100, 34));
        assert_eq!(ThumbnailDeriver::target_dimensions(0, 10, 3, 1000), (1, 10));
        assert_eq!(ThumbnailDeriver::target_dimensions(50, 60, 10, 10), (50, 60));
    }

    #[tokio::test]
    async fn test_derive_missing_height_from_ratio() {
        let (dir, storage, deriver) = deriver_with(&[]).await;
        storage
            .upload_with_key("original/post/1.png", png_image(1600, 900))
            .await
            .unwrap();

        let thumb = deriver.derive(800, 0, "post/1.png").await.unwrap();

        assert!(thumb.generated);
        assert_eq!(thumb.content_type, "image/png");
        assert_eq!(thumb.path, dir.path().join("800x0/post/1.png"));
        assert_eq!(ImageProcessor::get_dimensions(&thumb.bytes), Some((800, 450)));
        assert!(dir.path().join("800x0/post/1.png").exists());
    }

    #[tokio::test]
    async fn test_derive_is_idempotent() {
        let (_dir, storage, deriver) = deriver_with(&["100x100"]).await;
        storage
            .upload_with_key("original/a/b.jpg", jpeg_image(300, 200))
            .await
            .unwrap();

        let first = deriver.derive(100, 100, "a/b.jpg").await.unwrap();
        let second = deriver.derive(100, 100, "a/b.jpg").await.unwrap();

        assert!(first.generated);
        assert!(!second.generated);
        assert_eq!(first.bytes, second.bytes);
        assert_eq!(second.content_type, "image/jpeg");
        assert_eq!(ImageProcessor::get_dimensions(&second.bytes), Some((100, 100)));
    }

    #[tokio::test]
    async fn test_derive_size_not_allowed() {
        let (_dir, storage, deriver) = deriver_with(&["100x100"]).await;
        storage
            .upload_with_key("original/a.png", png_image(10, 10))
            .await
            .unwrap();

        let result = deriver.derive(50, 50, "a.png").await;
        assert!(matches!(
            result,
            Err(AppError::SizeNotAllowed {
                width: 50,
                height: 50
            })
        ));
    }

    #[tokio::test]
    async fn test_derive_zero_size_is_invalid() {
        let (_dir, _storage, deriver) = deriver_with(&["100x100"]).await;
        let result = deriver.derive(0, 0, "a.png").await;
        assert!(matches!(result, Err(AppError::DimensionsRequired)));
    }

    #[tokio::test]
    async fn test_derive_rejects_huge_dimensions() {
        let (dir, storage, deriver) = deriver_with(&[]).await;
        storage
            .upload_with_key("original/a.png", png_image(2, 2))
            .await
            .unwrap();

        let result = deriver.derive(u32::MAX, u32::MAX, "a.png").await;
        assert!(matches!(result, Err(AppError::SizeNotAllowed { .. })));

        let result = deriver.derive(u32::MAX, 0, "a.png").await;
        assert!(matches!(result, Err(AppError::SizeNotAllowed { .. })));
        assert!(!dir.path().join(format!("{}x0", u32::MAX)).exists());
    }

    #[tokio::test]
    async fn test_derive_rejects_filled_dimension_over_max() {
        let (_dir, storage, deriver) = deriver_with(&[]).await;
        let deriver = deriver.with_max_dimension(500);
        storage
            .upload_with_key("original/tall.png", png_image(10, 1000))
            .await
            .unwrap();

        // 400 wide keeps the ratio at 40000 high
        let result = deriver.derive(400, 0, "tall.png").await;
        assert!(matches!(
            result,
            Err(AppError::SizeNotAllowed {
                width: 400,
                height: 0
            })
        ));

        let thumb = deriver.derive(0, 500, "tall.png").await.unwrap();
        assert_eq!(ImageProcessor::get_dimensions(&thumb.bytes), Some((5, 500)));
    }

    #[tokio::test]
    async fn test_derive_directory_link_is_not_found() {
        let (dir, _storage, deriver) = deriver_with(&[]).await;
        std::fs::create_dir_all(dir.path().join("original/post/images")).unwrap();

        let result = deriver.derive(10, 10, "post/images").await;
        assert!(matches!(
            result,
            Err(AppError::NotFound { ref name }) if name == "images"
        ));
    }

    #[tokio::test]
    async fn test_derive_reads_header_past_large_metadata() {
        let (_dir, storage, deriver) = deriver_with(&[]).await;
        let jpeg = jpeg_image(40, 20);
        // Comment segments push the frame header past the first read
        let mut padded = jpeg[..2].to_vec();
        for _ in 0..2 {
            padded.extend_from_slice(&[0xFF, 0xFE, 0xEA, 0x62]);
            padded.extend(std::iter::repeat(b'x').take(0xEA60));
        }
        padded.extend_from_slice(&jpeg[2..]);
        assert!(padded.len() > HEADER_READ_BYTES);
        storage
            .upload_with_key("original/padded.jpg", padded)
            .await
            .unwrap();

        let thumb = deriver.derive(20, 0, "padded.jpg").await.unwrap();
        assert_eq!(ImageProcessor::get_dimensions(&thumb.bytes), Some((20, 10)));
    }

    #[tokio::test]
    async fn test_derive_not_found() {
        let (_dir, _storage, deriver) = deriver_with(&[]).await;
        let result = deriver.derive(100, 100, "post/missing.png").await;
        assert!(matches!(
            result,
            Err(AppError::NotFound { ref name }) if name == "missing.png"
        ));
    }

    #[tokio::test]
    async fn test_derive_not_an_image() {
        let (dir, storage, deriver) = deriver_with(&[]).await;
        storage
            .upload_with_key("original/notes.txt", b"just text".to_vec())
            .await
            .unwrap();

        let result = deriver.derive(100, 100, "notes.txt").await;
        assert!(matches!(
            result,
            Err(AppError::NotAnImage { ref name }) if name == "notes.txt"
        ));
        assert!(!dir.path().join("100x100").exists());
    }

    #[tokio::test]
    async fn test_derive_rejects_traversal() {
        let (_dir, _storage, deriver) = deriver_with(&[]).await;
        let result = deriver.derive(10, 10, "../../etc/passwd").await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
