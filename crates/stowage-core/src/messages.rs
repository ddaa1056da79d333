//! Error message templates
//!
//! Field errors attached to an upload owner and the client-facing text of
//! thumbnail errors are rendered from templates. A host can override any
//! template by error code; placeholders such as `{name}` or `{directory}` are
//! filled from the error's values.

use std::collections::HashMap;

use crate::error::{AppError, ErrorMetadata};

fn default_template(code: &str) -> Option<&'static str> {
    let template = match code {
        "UNSUPPORTED_UPLOAD_KIND" => "This type of upload is not supported",
        "FETCH_FAILED" => "Unable to download file",
        "DECODE_FAILED" => "Unable to decode file",
        "UNHANDLED_UPLOAD" => "Unable to handle file",
        "DIRECTORY_CREATE_FAILED" => "Unable to create directory '{directory}'",
        "SAVE_FAILED" => "Unable to save file",
        "SIZE_NOT_ALLOWED" => "Size '{width}x{height}' is not allowed",
        "NOT_FOUND" => "File '{name}' not found",
        "NOT_AN_IMAGE" => "File '{name}' is not an image",
        "DIMENSIONS_REQUIRED" => "Parameters 'width' and 'height' are required",
        "INVALID_INPUT" => "{message}",
        "INVALID_CONFIGURATION" => "{message}",
        _ => return None,
    };
    Some(template)
}

/// Message templates keyed by error code.
#[derive(Debug, Clone, Default)]
pub struct ErrorMessages {
    overrides: HashMap<String, String>,
}

impl ErrorMessages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the template used for errors with the given code.
    pub fn with(mut self, code: &str, template: impl Into<String>) -> Self {
        self.overrides.insert(code.to_string(), template.into());
        self
    }

    pub fn template_for(&self, code: &str) -> Option<&str> {
        self.overrides
            .get(code)
            .map(String::as_str)
            .or_else(|| default_template(code))
    }

    /// Render the message for an error, falling back to its display text.
    pub fn render(&self, err: &AppError) -> String {
        let Some(template) = self.template_for(err.error_code()) else {
            return err.to_string();
        };

        err.placeholders()
            .into_iter()
            .fold(template.to_string(), |message, (key, value)| {
                message.replace(&format!("{{{}}}", key), &value)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_default_template() {
        let messages = ErrorMessages::default();
        let err = AppError::DirectoryCreateFailed {
            directory: "/srv/uploads/post".to_string(),
        };
        assert_eq!(
            messages.render(&err),
            "Unable to create directory '/srv/uploads/post'"
        );
    }

    #[test]
    fn test_render_override() {
        let messages = ErrorMessages::new().with("NOT_FOUND", "Нет файла {name}");
        let err = AppError::NotFound {
            name: "a.png".to_string(),
        };
        assert_eq!(messages.render(&err), "Нет файла a.png");
    }

    #[test]
    fn test_render_without_template_uses_display() {
        let messages = ErrorMessages::default();
        let err = AppError::Internal("boom".to_string());
        assert_eq!(messages.render(&err), "Internal error: boom");
    }

    #[test]
    fn test_unknown_placeholder_left_intact() {
        let messages = ErrorMessages::new().with("SAVE_FAILED", "Cannot save {name}");
        let err = AppError::SaveFailed("disk full".to_string());
        assert_eq!(messages.render(&err), "Cannot save {name}");
    }

    #[test]
    fn test_invalid_input_renders_its_own_message() {
        let messages = ErrorMessages::default();
        let err = AppError::InvalidInput("Storage key contains invalid characters".to_string());
        assert_eq!(
            messages.render(&err),
            "Storage key contains invalid characters"
        );
        assert_eq!(
            messages.render(&AppError::DimensionsRequired),
            "Parameters 'width' and 'height' are required"
        );
    }
}
