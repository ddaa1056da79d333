use super::processor::ImageProcessor;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat};
use img_parts::{jpeg::Jpeg, ImageEXIF};
use stowage_core::AppError;
use stowage_storage::Storage;

const ORIENTATION_TAG: u16 = 0x0112;
const TYPE_SHORT: u16 = 3;

/// Set the IFD0 Orientation entry of a raw TIFF/EXIF block to 1 (top-left).
///
/// Returns whether an entry was found and rewritten.
fn reset_orientation(tiff: &mut [u8]) -> bool {
    let big_endian = match tiff.get(0..2) {
        Some(b"MM") => true,
        Some(b"II") => false,
        _ => return false,
    };
    let read_u16 = |buf: &[u8], at: usize| -> Option<u16> {
        let raw: [u8; 2] = buf.get(at..at + 2)?.try_into().ok()?;
        Some(if big_endian {
            u16::from_be_bytes(raw)
        } else {
            u16::from_le_bytes(raw)
        })
    };
    let read_u32 = |buf: &[u8], at: usize| -> Option<u32> {
        let raw: [u8; 4] = buf.get(at..at + 4)?.try_into().ok()?;
        Some(if big_endian {
            u32::from_be_bytes(raw)
        } else {
            u32::from_le_bytes(raw)
        })
    };

    if read_u16(tiff, 2) != Some(42) {
        return false;
    }
    let Some(ifd) = read_u32(tiff, 4).map(|offset| offset as usize) else {
        return false;
    };
    let Some(count) = read_u16(tiff, ifd) else {
        return false;
    };

    for index in 0..usize::from(count) {
        let entry = ifd + 2 + index * 12;
        if read_u16(tiff, entry) != Some(ORIENTATION_TAG) {
            continue;
        }
        if read_u16(tiff, entry + 2) != Some(TYPE_SHORT) {
            return false;
        }
        let one = if big_endian {
            1u16.to_be_bytes()
        } else {
            1u16.to_le_bytes()
        };
        return match tiff.get_mut(entry + 8..entry + 10) {
            Some(value) => {
                value.copy_from_slice(&one);
                true
            }
            None => false,
        };
    }

    false
}

/// Image orientation operations
pub struct ImageOrientation;

impl ImageOrientation {
    /// Rotate image by specified angle (90, 180, or 270 degrees clockwise)
    pub fn rotate_by_angle(img: DynamicImage, angle: u16) -> DynamicImage {
        match angle {
            90 => img.rotate90(),
            180 => img.rotate180(),
            270 => img.rotate270(),
            _ => img,
        }
    }

    /// Rotate a JPEG upright according to its EXIF orientation.
    ///
    /// Returns `None` when the data is not a JPEG or is already upright. The
    /// original EXIF block is carried over with its orientation reset to 1.
    pub fn fix_jpeg_orientation(data: &[u8]) -> Result<Option<Vec<u8>>, AppError> {
        if ImageProcessor::detect_format(data) != Some(ImageFormat::Jpeg) {
            return Ok(None);
        }

        let orientation = ImageProcessor::read_exif_orientation(data);
        let Some(angle) = ImageProcessor::rotation_for_orientation(orientation) else {
            return Ok(None);
        };

        tracing::debug!(orientation = orientation, rotate = angle, "Applying EXIF orientation");

        let img = ImageProcessor::decode(data)?;
        let rotated = Self::rotate_by_angle(img, angle);
        let encoded = ImageProcessor::encode(&rotated, ImageFormat::Jpeg)?;
        Self::carry_exif(data, encoded).map(Some)
    }

    /// Attach the EXIF block of `original` to `encoded` with an upright orientation.
    fn carry_exif(original: &[u8], encoded: Vec<u8>) -> Result<Vec<u8>, AppError> {
        let Some(exif) = Jpeg::from_bytes(Bytes::copy_from_slice(original))
            .ok()
            .and_then(|jpeg| jpeg.exif())
        else {
            return Ok(encoded);
        };

        let mut tiff = exif.to_vec();
        if !reset_orientation(&mut tiff) {
            tracing::debug!("EXIF orientation entry could not be rewritten, dropping EXIF");
            return Ok(encoded);
        }

        let mut jpeg = Jpeg::from_bytes(Bytes::from(encoded)).map_err(|e| {
            AppError::ImageProcessing(format!("Failed to read encoded JPEG: {}", e))
        })?;
        jpeg.set_exif(Some(Bytes::from(tiff)));

        Ok(jpeg.encoder().bytes().to_vec())
    }

    /// Fix the orientation of a stored JPEG in place. Returns whether the file changed.
    pub async fn fix_stored(storage: &dyn Storage, storage_key: &str) -> Result<bool, AppError> {
        let data = storage.download(storage_key).await?;

        let fixed = tokio::task::spawn_blocking(move || Self::fix_jpeg_orientation(&data))
            .await
            .map_err(|e| AppError::Internal(format!("Orientation task failed: {}", e)))??;

        match fixed {
            Some(bytes) => {
                storage.upload_with_key(storage_key, bytes).await?;
                tracing::info!(key = %storage_key, "Fixed image orientation");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_images::{jpeg_image, jpeg_with_orientation, png_image};
    use image::{GenericImageView, Rgba, RgbaImage};
    use std::io::Cursor;
    use stowage_storage::LocalStorage;
    use tempfile::tempdir;

    fn exif_make(data: &[u8]) -> Option<Vec<u8>> {
        let exif = exif::Reader::new()
            .read_from_container(&mut Cursor::new(data))
            .ok()?;
        match &exif.get_field(exif::Tag::Make, exif::In::PRIMARY)?.value {
            exif::Value::Ascii(values) => values.first().cloned(),
            _ => None,
        }
    }

    #[test]
    fn test_reset_orientation_both_byte_orders() {
        let mut big = vec![b'M', b'M', 0, 42, 0, 0, 0, 8, 0, 1];
        big.extend_from_slice(&[0x01, 0x12, 0, 3, 0, 0, 0, 1, 0, 6, 0, 0, 0, 0, 0, 0]);
        assert!(reset_orientation(&mut big));
        assert_eq!(&big[18..20], &[0, 1]);

        let mut little = vec![b'I', b'I', 42, 0, 8, 0, 0, 0, 1, 0];
        little.extend_from_slice(&[0x12, 0x01, 3, 0, 1, 0, 0, 0, 8, 0, 0, 0, 0, 0, 0, 0]);
        assert!(reset_orientation(&mut little));
        assert_eq!(&little[18..20], &[1, 0]);
    }

    #[test]
    fn test_reset_orientation_rejects_malformed() {
        assert!(!reset_orientation(&mut []));
        assert!(!reset_orientation(&mut b"XX\0\x2a".to_vec()));
        // IFD offset beyond the buffer
        assert!(!reset_orientation(&mut vec![b'M', b'M', 0, 42, 0, 0, 1, 0]));
    }

    #[test]
    fn test_fix_orientation_keeps_other_exif() {
        let data = jpeg_with_orientation(40, 20, 6);
        assert_eq!(exif_make(&data), Some(b"Cam".to_vec()));

        let fixed = ImageOrientation::fix_jpeg_orientation(&data)
            .unwrap()
            .unwrap();

        assert_eq!(exif_make(&fixed), Some(b"Cam".to_vec()));
        assert_eq!(ImageProcessor::read_exif_orientation(&fixed), 1);
        assert_eq!(ImageProcessor::get_dimensions(&fixed), Some((20, 40)));
    }

    #[test]
    fn test_rotation_dimension_changes() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 2, Rgba([0, 0, 255, 255])));

        let rotated = ImageOrientation::rotate_by_angle(img.clone(), 90);
        assert_eq!(rotated.dimensions(), (2, 4));

        let rotated = ImageOrientation::rotate_by_angle(img.clone(), 180);
        assert_eq!(rotated.dimensions(), (4, 2));

        let rotated = ImageOrientation::rotate_by_angle(img.clone(), 270);
        assert_eq!(rotated.dimensions(), (2, 4));

        let rotated = ImageOrientation::rotate_by_angle(img.clone(), 45);
        assert_eq!(rotated.dimensions(), img.dimensions());
    }

    #[test]
    fn test_fix_orientation_rotates_quarter_turn() {
        for orientation in [6u16, 8] {
            let data = jpeg_with_orientation(40, 20, orientation);
            let fixed = ImageOrientation::fix_jpeg_orientation(&data)
                .unwrap()
                .expect("image should be rotated");

            assert_eq!(ImageProcessor::get_dimensions(&fixed), Some((20, 40)));
            assert_eq!(ImageProcessor::read_exif_orientation(&fixed), 1);
        }
    }

    #[test]
    fn test_fix_orientation_half_turn_keeps_dimensions() {
        let data = jpeg_with_orientation(40, 20, 3);
        let fixed = ImageOrientation::fix_jpeg_orientation(&data)
            .unwrap()
            .unwrap();
        assert_eq!(ImageProcessor::get_dimensions(&fixed), Some((40, 20)));
        assert_eq!(ImageProcessor::read_exif_orientation(&fixed), 1);
    }

    #[test]
    fn test_fix_orientation_skips_upright_and_non_jpeg() {
        assert!(ImageOrientation::fix_jpeg_orientation(&jpeg_image(10, 10))
            .unwrap()
            .is_none());
        assert!(
            ImageOrientation::fix_jpeg_orientation(&jpeg_with_orientation(10, 10, 1))
                .unwrap()
                .is_none()
        );
        assert!(ImageOrientation::fix_jpeg_orientation(&png_image(10, 10))
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_fix_stored_rewrites_file() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/uploads".to_string())
            .await
            .unwrap();
        storage
            .upload_with_key("original/a.jpg", jpeg_with_orientation(30, 10, 6))
            .await
            .unwrap();

        assert!(ImageOrientation::fix_stored(&storage, "original/a.jpg")
            .await
            .unwrap());
        let stored = storage.download("original/a.jpg").await.unwrap();
        assert_eq!(ImageProcessor::get_dimensions(&stored), Some((10, 30)));

        // Second pass finds nothing to do
        assert!(!ImageOrientation::fix_stored(&storage, "original/a.jpg")
            .await
            .unwrap());
    }
}
