use std::path::PathBuf;

use serde::Serialize;

/// Location of a file after a successful persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    /// Relative link written back onto the owner
    pub link: String,
    /// Absolute filesystem path of the stored bytes
    pub path: PathBuf,
    /// Public URL of the stored file
    pub url: String,
}
