//! Data models for upload handling
//!
//! This module contains the values flowing through the upload pipeline:
//! normalized uploads, placement policies and the result of a persist.

mod policy;
mod stored;
mod upload;

pub use policy::{FileNaming, FolderSegment, NamingFn, PlacementPolicy, SegmentFn};
pub use stored::StoredFile;
pub use upload::{FileSource, UploadKind, UploadValue, UploadedFile};
