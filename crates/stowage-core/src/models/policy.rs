use std::fmt;
use std::sync::Arc;

use crate::hooks::UploadOwner;
use crate::models::UploadedFile;

/// Computes a folder segment from the owner, attribute name and upload.
pub type SegmentFn = Arc<dyn Fn(&dyn UploadOwner, &str, &UploadedFile) -> String + Send + Sync>;

/// Computes a file name from the owner, attribute name and upload.
pub type NamingFn = Arc<dyn Fn(&dyn UploadOwner, &str, &UploadedFile) -> String + Send + Sync>;

/// One folder level of a link
#[derive(Clone, Default)]
pub enum FolderSegment {
    /// Segment is left out
    Disabled,
    /// Fixed folder name
    Literal(String),
    /// Built-in rule for this level
    #[default]
    Default,
    Custom(SegmentFn),
}

impl fmt::Debug for FolderSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FolderSegment::Disabled => f.write_str("Disabled"),
            FolderSegment::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            FolderSegment::Default => f.write_str("Default"),
            FolderSegment::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// How the final file name of a link is chosen
#[derive(Clone)]
pub enum FileNaming {
    /// Sanitized original name
    Original,
    /// Template with `{id}`, `{attribute}`, `{name}` and `{ext}` placeholders
    Template(String),
    Custom(NamingFn),
}

impl Default for FileNaming {
    fn default() -> Self {
        FileNaming::Template(PlacementPolicy::DEFAULT_TEMPLATE.to_string())
    }
}

impl fmt::Debug for FileNaming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileNaming::Original => f.write_str("Original"),
            FileNaming::Template(template) => f.debug_tuple("Template").field(template).finish(),
            FileNaming::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Rules that turn a record, attribute and upload into a link.
#[derive(Debug, Clone, Default)]
pub struct PlacementPolicy {
    pub model_folder: FolderSegment,
    pub shard_folder: FolderSegment,
    pub attribute_folder: FolderSegment,
    pub file_name: FileNaming,
}

impl PlacementPolicy {
    pub const DEFAULT_TEMPLATE: &'static str = "{id}_{name}.{ext}";

    pub fn with_model_folder(mut self, segment: FolderSegment) -> Self {
        self.model_folder = segment;
        self
    }

    pub fn with_shard_folder(mut self, segment: FolderSegment) -> Self {
        self.shard_folder = segment;
        self
    }

    pub fn with_attribute_folder(mut self, segment: FolderSegment) -> Self {
        self.attribute_folder = segment;
        self
    }

    pub fn with_file_name(mut self, naming: FileNaming) -> Self {
        self.file_name = naming;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = PlacementPolicy::default();
        assert!(matches!(policy.model_folder, FolderSegment::Default));
        assert!(matches!(policy.shard_folder, FolderSegment::Default));
        assert!(matches!(policy.attribute_folder, FolderSegment::Default));
        assert!(matches!(
            policy.file_name,
            FileNaming::Template(ref t) if t == "{id}_{name}.{ext}"
        ));
    }

    #[test]
    fn test_debug_hides_closures() {
        let custom: SegmentFn = Arc::new(|_, attribute, _| attribute.to_uppercase());
        let policy = PlacementPolicy::default()
            .with_model_folder(FolderSegment::Custom(custom))
            .with_shard_folder(FolderSegment::Disabled);
        let debug = format!("{:?}", policy);
        assert!(debug.contains("Custom(..)"));
        assert!(debug.contains("Disabled"));
    }
}
