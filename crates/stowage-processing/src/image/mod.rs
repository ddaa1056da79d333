//! Image processing module
//!
//! This module provides image capabilities including:
//! - Header validation and format detection (processor)
//! - EXIF orientation correction (orientation)
//! - Lazily derived thumbnails (thumbnail)

pub mod orientation;
pub mod processor;
pub mod thumbnail;

pub use orientation::ImageOrientation;
pub use processor::ImageProcessor;
pub use thumbnail::{Thumbnail, ThumbnailDeriver};
