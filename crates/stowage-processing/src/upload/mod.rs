//! Upload handling: intake of raw values and the per-record upload pipeline

pub mod behavior;
pub mod intake;

pub use behavior::{ImageOptions, UploadBehavior, UploadBehaviorBuilder};
pub use intake::UploadIntake;
