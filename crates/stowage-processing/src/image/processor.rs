//! Image processor - header validation, format detection and EXIF orientation

use image::{DynamicImage, ImageError, ImageFormat, ImageReader};
use std::io::Cursor;
use stowage_core::AppError;

pub struct ImageProcessor;

impl ImageProcessor {
    /// Read image dimensions from the header without decoding pixels.
    pub fn get_dimensions(data: &[u8]) -> Option<(u32, u32)> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .ok()?;
        reader.format()?;
        match reader.into_dimensions() {
            Ok((0, _)) | Ok((_, 0)) => None,
            Ok(dimensions) => Some(dimensions),
            Err(_) => None,
        }
    }

    /// Detect the encoded format from magic bytes
    pub fn detect_format(data: &[u8]) -> Option<ImageFormat> {
        image::guess_format(data).ok()
    }

    pub fn content_type(format: ImageFormat) -> &'static str {
        format.to_mime_type()
    }

    /// Read the EXIF orientation tag.
    ///
    /// Returns the orientation value (1-8), or 1 (normal) when the image has no
    /// EXIF block or no orientation tag.
    pub fn read_exif_orientation(data: &[u8]) -> u8 {
        let mut cursor = Cursor::new(data);
        let Ok(exif) = exif::Reader::new().read_from_container(&mut cursor) else {
            return 1;
        };

        exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .and_then(|value| u8::try_from(value).ok())
            .filter(|value| (1..=8).contains(value))
            .unwrap_or(1)
    }

    /// Clockwise rotation that brings an image with the given EXIF orientation upright.
    ///
    /// Only the pure rotations are corrected; mirrored orientations are left as is.
    pub fn rotation_for_orientation(orientation: u8) -> Option<u16> {
        match orientation {
            3 => Some(180),
            6 => Some(90),
            8 => Some(270),
            _ => None,
        }
    }

    pub fn decode(data: &[u8]) -> Result<DynamicImage, AppError> {
        ImageReader::new(Cursor::new(data))
            .with_guessed_format()?
            .decode()
            .map_err(|e| AppError::ImageProcessing(format!("Failed to decode image: {}", e)))
    }

    /// Encode an image, reporting formats without a compiled-in encoder as a missing dependency.
    pub fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, AppError> {
        let estimated_size = img.width() as usize * img.height() as usize * 3;
        let mut buffer = Vec::with_capacity(estimated_size);
        img.write_to(&mut Cursor::new(&mut buffer), format)
            .map_err(|e| match e {
                ImageError::Unsupported(_) => AppError::MissingDependency(format!(
                    "No encoder available for {:?}: {}",
                    format, e
                )),
                other => AppError::ImageProcessing(format!("Failed to encode image: {}", other)),
            })?;
        Ok(buffer)
    }
}
