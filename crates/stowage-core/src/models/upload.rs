use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempPath;
use uuid::Uuid;

/// How an upload reached the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadKind {
    Multipart,
    RemoteUrl,
    DataUri,
    LocalPath,
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploadKind::Multipart => "multipart",
            UploadKind::RemoteUrl => "remote_url",
            UploadKind::DataUri => "data_uri",
            UploadKind::LocalPath => "local_path",
        };
        f.write_str(name)
    }
}

/// Where the bytes of an upload live until they are persisted
#[derive(Debug)]
pub enum FileSource {
    /// Temporary file owned by the upload, removed on drop
    Staged(TempPath),
    /// Existing server-local file referenced in place
    Path(PathBuf),
}

/// A normalized upload, regardless of how it arrived.
#[derive(Debug)]
pub struct UploadedFile {
    kind: UploadKind,
    name: String,
    content_type: Option<String>,
    size: u64,
    token: String,
    source: FileSource,
}

impl UploadedFile {
    /// Stage `data` into a fresh temporary file.
    pub fn stage(
        kind: UploadKind,
        name: impl Into<String>,
        content_type: Option<String>,
        data: &[u8],
    ) -> io::Result<Self> {
        let mut temp = tempfile::Builder::new().prefix("ub_").tempfile()?;
        temp.write_all(data)?;
        temp.flush()?;

        Ok(Self {
            kind,
            name: name.into(),
            content_type,
            size: data.len() as u64,
            token: new_token(),
            source: FileSource::Staged(temp.into_temp_path()),
        })
    }

    /// Wrap a multipart part that has already been read into memory.
    pub fn from_multipart(
        name: impl Into<String>,
        content_type: Option<String>,
        data: &[u8],
    ) -> io::Result<Self> {
        Self::stage(UploadKind::Multipart, name, content_type, data)
    }

    /// Reference an existing server-local file without copying it.
    pub fn from_path(
        path: PathBuf,
        name: impl Into<String>,
        content_type: Option<String>,
    ) -> io::Result<Self> {
        let size = std::fs::metadata(&path)?.len();
        Ok(Self {
            kind: UploadKind::LocalPath,
            name: name.into(),
            content_type,
            size,
            token: new_token(),
            source: FileSource::Path(path),
        })
    }

    /// Replace the unique token, for callers that need a predictable `{name}`.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Replace the client-facing file name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn kind(&self) -> UploadKind {
        self.kind
    }

    pub fn is_multipart(&self) -> bool {
        self.kind == UploadKind::Multipart
    }

    /// Original file name as supplied by the client
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Unique token generated when the upload was created
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Lower-cased extension of the original name, empty if it has none.
    pub fn extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default()
    }

    /// Location of the bytes on disk.
    pub fn path(&self) -> &Path {
        match &self.source {
            FileSource::Staged(temp) => temp,
            FileSource::Path(path) => path,
        }
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }
}

fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Raw value a host assigns to a file attribute
#[derive(Debug, Default)]
pub enum UploadValue {
    #[default]
    Empty,
    /// Multipart upload already parsed by the host
    File(UploadedFile),
    /// Remote URL, data URI or server-local path
    Text(String),
}

impl UploadValue {
    pub fn is_empty(&self) -> bool {
        match self {
            UploadValue::Empty => true,
            UploadValue::Text(text) => text.trim().is_empty(),
            UploadValue::File(_) => false,
        }
    }
}

impl From<UploadedFile> for UploadValue {
    fn from(file: UploadedFile) -> Self {
        UploadValue::File(file)
    }
}

impl From<String> for UploadValue {
    fn from(text: String) -> Self {
        UploadValue::Text(text)
    }
}

impl From<&str> for UploadValue {
    fn from(text: &str) -> Self {
        UploadValue::Text(text.to_string())
    }
}
