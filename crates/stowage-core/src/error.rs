//! Error types module
//!
//! Every failure an upload or thumbnail operation can produce is a variant of
//! `AppError`. Intake and persistence failures are rendered into field errors
//! on the owning record; thumbnail failures travel up to the HTTP layer, which
//! uses `ErrorMetadata` to pick a status code and response body.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like a missing file
    Debug,
    /// Warning level - for rejected requests and bad inputs
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "NOT_FOUND")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("This type of upload is not supported")]
    UnsupportedUploadKind,

    #[error("Failed to fetch remote file: {0}")]
    FetchFailed(String),

    #[error("Failed to decode data URI: {0}")]
    DecodeFailed(String),

    #[error("Unable to handle file")]
    UnhandledUpload,

    #[error("Unable to create directory '{directory}'")]
    DirectoryCreateFailed { directory: String },

    #[error("Unable to save file: {0}")]
    SaveFailed(String),

    #[error("Size '{width}x{height}' is not allowed")]
    SizeNotAllowed { width: u32, height: u32 },

    #[error("File '{name}' not found")]
    NotFound { name: String },

    #[error("File '{name}' is not an image")]
    NotAnImage { name: String },

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parameters 'width' and 'height' are required")]
    DimensionsRequired,

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::UnsupportedUploadKind => (
            400,
            "UNSUPPORTED_UPLOAD_KIND",
            false,
            Some("Send the file as a multipart upload"),
            false,
            LogLevel::Debug,
        ),
        AppError::FetchFailed(_) => (
            502,
            "FETCH_FAILED",
            true,
            Some("Check that the remote URL is reachable"),
            false,
            LogLevel::Warn,
        ),
        AppError::DecodeFailed(_) => (
            400,
            "DECODE_FAILED",
            false,
            Some("Check the base64 payload of the data URI"),
            false,
            LogLevel::Debug,
        ),
        AppError::UnhandledUpload => (
            422,
            "UNHANDLED_UPLOAD",
            false,
            Some("Provide a multipart file, URL, data URI or existing server path"),
            false,
            LogLevel::Debug,
        ),
        AppError::DirectoryCreateFailed { .. } => (
            500,
            "DIRECTORY_CREATE_FAILED",
            true,
            Some("Check permissions of the upload base path"),
            true,
            LogLevel::Error,
        ),
        AppError::SaveFailed(_) => (
            500,
            "SAVE_FAILED",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::SizeNotAllowed { .. } => (
            403,
            "SIZE_NOT_ALLOWED",
            false,
            Some("Request one of the configured thumbnail sizes"),
            false,
            LogLevel::Warn,
        ),
        AppError::NotFound { .. } => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the file link exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotAnImage { .. } => (
            403,
            "NOT_AN_IMAGE",
            false,
            Some("Thumbnails can only be derived from raster images"),
            false,
            LogLevel::Warn,
        ),
        AppError::MissingDependency(_) => (
            500,
            "MISSING_DEPENDENCY",
            false,
            Some("Contact support if this error persists"),
            true,
            LogLevel::Error,
        ),
        AppError::InvalidConfiguration(_) => (
            500,
            "INVALID_CONFIGURATION",
            false,
            Some("Fix the upload configuration"),
            true,
            LogLevel::Error,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::DimensionsRequired => (
            400,
            "DIMENSIONS_REQUIRED",
            false,
            Some("Give a non-zero width, height or both"),
            false,
            LogLevel::Debug,
        ),
        AppError::ImageProcessing(_) => (
            500,
            "IMAGE_PROCESSING_ERROR",
            false,
            Some("Check image format and try a different file"),
            false,
            LogLevel::Warn,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::UnsupportedUploadKind => "UnsupportedUploadKind",
            AppError::FetchFailed(_) => "FetchFailed",
            AppError::DecodeFailed(_) => "DecodeFailed",
            AppError::UnhandledUpload => "UnhandledUpload",
            AppError::DirectoryCreateFailed { .. } => "DirectoryCreateFailed",
            AppError::SaveFailed(_) => "SaveFailed",
            AppError::SizeNotAllowed { .. } => "SizeNotAllowed",
            AppError::NotFound { .. } => "NotFound",
            AppError::NotAnImage { .. } => "NotAnImage",
            AppError::MissingDependency(_) => "MissingDependency",
            AppError::InvalidConfiguration(_) => "InvalidConfiguration",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::DimensionsRequired => "DimensionsRequired",
            AppError::ImageProcessing(_) => "ImageProcessing",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Named values a message template may reference.
    pub fn placeholders(&self) -> Vec<(&'static str, String)> {
        match self {
            AppError::DirectoryCreateFailed { directory } => {
                vec![("directory", directory.clone())]
            }
            AppError::SizeNotAllowed { width, height } => vec![
                ("width", width.to_string()),
                ("height", height.to_string()),
            ],
            AppError::NotFound { name } | AppError::NotAnImage { name } => {
                vec![("name", name.clone())]
            }
            AppError::InvalidInput(message) | AppError::InvalidConfiguration(message) => {
                vec![("message", message.clone())]
            }
            _ => Vec::new(),
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::DirectoryCreateFailed { .. } | AppError::SaveFailed(_) => {
                "Unable to save file".to_string()
            }
            AppError::MissingDependency(_) => "Image codec not available".to_string(),
            AppError::InvalidConfiguration(_) => "Upload service is misconfigured".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
            other => crate::messages::ErrorMessages::default().render(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_not_found() {
        let err = AppError::NotFound {
            name: "photo.jpg".to_string(),
        };
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert!(!err.is_recoverable());
        assert_eq!(err.client_message(), "File 'photo.jpg' not found");
        assert!(!err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_error_metadata_forbidden_kinds() {
        let size = AppError::SizeNotAllowed {
            width: 50,
            height: 50,
        };
        assert_eq!(size.http_status_code(), 403);
        assert_eq!(size.error_code(), "SIZE_NOT_ALLOWED");

        let not_image = AppError::NotAnImage {
            name: "notes.txt".to_string(),
        };
        assert_eq!(not_image.http_status_code(), 403);
        assert_eq!(not_image.client_message(), "File 'notes.txt' is not an image");
    }

    #[test]
    fn test_error_metadata_directory_create_is_sensitive() {
        let err = AppError::DirectoryCreateFailed {
            directory: "/var/uploads/100x100".to_string(),
        };
        assert_eq!(err.http_status_code(), 500);
        assert!(err.is_sensitive());
        assert!(!err.client_message().contains("/var/uploads"));
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_invalid_input_client_message_is_not_about_dimensions() {
        let err = AppError::InvalidInput("Storage key contains invalid characters".to_string());
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(
            err.client_message(),
            "Storage key contains invalid characters"
        );

        let err = AppError::DimensionsRequired;
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.error_code(), "DIMENSIONS_REQUIRED");
        assert_eq!(
            err.client_message(),
            "Parameters 'width' and 'height' are required"
        );
    }

    #[test]
    fn test_placeholders() {
        let err = AppError::SizeNotAllowed {
            width: 100,
            height: 0,
        };
        let placeholders = err.placeholders();
        assert!(placeholders.contains(&("width", "100".to_string())));
        assert!(placeholders.contains(&("height", "0".to_string())));
        assert!(AppError::UnhandledUpload.placeholders().is_empty());
    }

    #[test]
    fn test_detailed_message_includes_source_chain() {
        let err = AppError::from(anyhow::anyhow!("disk unplugged").context("writing thumbnail"));
        let details = err.detailed_message();
        assert!(details.starts_with("Internal error with source"));
        assert!(details.contains("Caused by"));
    }
}
