//! Stowage Processing Library
//!
//! This crate provides the upload pipeline and image processing for Stowage:
//! - Upload intake (multipart, remote URL, data URI, server path)
//! - The upload behavior attached to host records
//! - Image validation and EXIF orientation handling
//! - On-demand thumbnail derivation

pub mod image;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_images;

pub use image::{ImageOrientation, ImageProcessor, Thumbnail, ThumbnailDeriver};
pub use upload::{ImageOptions, UploadBehavior, UploadBehaviorBuilder, UploadIntake};
