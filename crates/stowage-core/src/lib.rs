//! Stowage Core Library
//!
//! This crate provides the domain models, error types, message templates and
//! configuration shared by every Stowage component.

pub mod config;
pub mod error;
pub mod hooks;
pub mod messages;
pub mod models;

// Re-export commonly used types
pub use config::{BaseConfig, Config, StowageConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use hooks::{numeric_id, NoOpListener, UploadListener, UploadOwner};
pub use messages::ErrorMessages;
pub use models::{
    FileNaming, FileSource, FolderSegment, NamingFn, PlacementPolicy, SegmentFn, StoredFile,
    UploadKind, UploadValue, UploadedFile,
};
