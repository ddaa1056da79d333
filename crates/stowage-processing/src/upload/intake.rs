//! Upload intake: turn a raw attribute value into an `UploadedFile`.
//!
//! Accepted inputs:
//! - a multipart upload the host has already parsed
//! - an `http://`, `https://` or protocol-relative `//` URL, downloaded to a temp file
//! - a `data:<mime>;base64,<payload>` URI, decoded to a temp file
//! - a path to an existing server-local file, referenced in place

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use base64::Engine;
use regex::Regex;
use stowage_core::{AppError, Config, UploadKind, UploadValue, UploadedFile};

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_REMOTE_BYTES: usize = 20 * 1024 * 1024;

static REMOTE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(https?:)?//").expect("valid remote URL pattern"));

static DATA_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^data:([\w/.+-]+);base64,").expect("valid data URI pattern")
});

#[derive(Clone, Debug)]
pub struct UploadIntake {
    client: reqwest::Client,
    allowlist: Option<Vec<String>>,
    max_remote_bytes: usize,
}

impl UploadIntake {
    pub fn new(
        timeout: Duration,
        allowlist: Option<Vec<String>>,
        max_remote_bytes: usize,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            allowlist,
            max_remote_bytes,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(
            Duration::from_secs(config.remote_fetch_timeout_secs()),
            config.url_upload_allowlist().map(<[String]>::to_vec),
            config.max_remote_file_size_bytes(),
        )
    }

    pub fn with_defaults() -> Result<Self, AppError> {
        Self::new(
            Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            None,
            DEFAULT_MAX_REMOTE_BYTES,
        )
    }

    /// Normalize a raw value. Empty values yield `Ok(None)`.
    ///
    /// Text values are rejected with `UnsupportedUploadKind` unless
    /// `allow_non_multipart` is set.
    pub async fn normalize(
        &self,
        raw: UploadValue,
        allow_non_multipart: bool,
    ) -> Result<Option<UploadedFile>, AppError> {
        let text = match raw {
            UploadValue::Empty => return Ok(None),
            UploadValue::File(file) => return Ok(Some(file)),
            UploadValue::Text(text) => text.trim().to_string(),
        };

        if text.is_empty() {
            return Ok(None);
        }

        if !allow_non_multipart {
            return Err(AppError::UnsupportedUploadKind);
        }

        let file = if REMOTE_URL.is_match(&text) {
            self.fetch_remote(&text).await?
        } else if let Some(captures) = DATA_URI.captures(&text) {
            let mime = captures
                .get(1)
                .map(|m| m.as_str().to_lowercase())
                .unwrap_or_default();
            let payload = &text[captures.get(0).map(|m| m.end()).unwrap_or(0)..];
            Self::decode_data_uri(&mime, payload).await?
        } else {
            Self::reference_local(&text).await?
        };

        tracing::debug!(
            kind = %file.kind(),
            name = %file.name(),
            content_type = ?file.content_type(),
            size_bytes = file.size(),
            "Upload normalized"
        );

        Ok(Some(file))
    }

    fn is_host_allowed(&self, host: &str) -> bool {
        let Some(allowed_domains) = &self.allowlist else {
            return true;
        };
        let host_lower = host.to_lowercase();
        allowed_domains.iter().any(|allowed| {
            let allowed_lower = allowed.to_lowercase();
            host_lower == allowed_lower || host_lower.ends_with(&format!(".{}", allowed_lower))
        })
    }

    async fn fetch_remote(&self, raw_url: &str) -> Result<UploadedFile, AppError> {
        let url = if raw_url.starts_with("//") {
            format!("https:{}", raw_url)
        } else {
            raw_url.to_string()
        };

        let parsed_url = reqwest::Url::parse(&url)
            .map_err(|e| AppError::FetchFailed(format!("Invalid URL format: {}", e)))?;
        let host = parsed_url
            .host_str()
            .ok_or_else(|| AppError::FetchFailed("URL must have a host".to_string()))?;

        if !self.is_host_allowed(host) {
            tracing::warn!(url = %url, host = %host, "Remote upload host not allowed");
            return Err(AppError::FetchFailed(format!(
                "URL hostname '{}' is not in the allowed list",
                host
            )));
        }

        let name = parsed_url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .map(|s| s.to_string())
            .unwrap_or_else(|| "file".to_string());

        let mut response = self.client.get(parsed_url.clone()).send().await.map_err(|e| {
            tracing::warn!(error = %e, url = %url, "Failed to download from URL");
            AppError::FetchFailed(format!("Failed to download from URL: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(AppError::FetchFailed(format!(
                "URL returned status code: {}",
                response.status()
            )));
        }

        let header_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.split(';').next())
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());

        let mut data = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AppError::FetchFailed(format!("Failed to read response body: {}", e)))?
        {
            if data.len() + chunk.len() > self.max_remote_bytes {
                return Err(AppError::FetchFailed(format!(
                    "Remote file exceeds {} bytes",
                    self.max_remote_bytes
                )));
            }
            data.extend_from_slice(&chunk);
        }

        let content_type = mime_guess::from_path(&name)
            .first()
            .map(|m| m.to_string())
            .or(header_type);

        tracing::info!(url = %url, size_bytes = data.len(), "Downloaded remote upload");

        stage(UploadKind::RemoteUrl, name, content_type, data)
            .await
            .map_err(|e| AppError::FetchFailed(format!("Failed to stage download: {}", e)))
    }

    async fn decode_data_uri(mime: &str, payload: &str) -> Result<UploadedFile, AppError> {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        let data = base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| AppError::DecodeFailed(e.to_string()))?;

        let extension = extension_for_mime(mime, &data);
        let file = stage(UploadKind::DataUri, String::new(), Some(mime.to_string()), data)
            .await
            .map_err(|e| AppError::DecodeFailed(format!("Failed to stage decoded data: {}", e)))?;

        let name = match extension {
            Some(ext) => format!("ub_{}.{}", file.token(), ext),
            None => format!("ub_{}", file.token()),
        };
        Ok(file.with_name(name))
    }

    async fn reference_local(raw_path: &str) -> Result<UploadedFile, AppError> {
        let path = normalize_path(raw_path);

        if !tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            tracing::debug!(path = %path.display(), "Server path upload does not exist");
            return Err(AppError::UnhandledUpload);
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let content_type = infer::get_from_path(&path)
            .ok()
            .flatten()
            .map(|kind| kind.mime_type().to_string())
            .or_else(|| mime_guess::from_path(&path).first().map(|m| m.to_string()));

        UploadedFile::from_path(path, name, content_type).map_err(|_| AppError::UnhandledUpload)
    }
}

async fn stage(
    kind: UploadKind,
    name: String,
    content_type: Option<String>,
    data: Vec<u8>,
) -> std::io::Result<UploadedFile> {
    tokio::task::spawn_blocking(move || UploadedFile::stage(kind, name, content_type, &data))
        .await
        .map_err(std::io::Error::other)?
}

/// Pick a file extension for decoded data, preferring what the bytes say.
fn extension_for_mime(mime: &str, data: &[u8]) -> Option<String> {
    if let Some(kind) = infer::get(data) {
        if kind.mime_type().eq_ignore_ascii_case(mime) {
            return Some(kind.extension().to_string());
        }
    }

    let extensions = mime_guess::get_mime_extensions_str(mime)?;
    let subtype = mime.rsplit('/').next().unwrap_or_default();
    extensions
        .iter()
        .find(|ext| **ext == subtype)
        .or_else(|| extensions.first())
        .map(|ext| ext.to_string())
}

/// Collapse `.` and `..` components and unify separators of a server path.
fn normalize_path(raw: &str) -> PathBuf {
    let unified = raw.replace('\\', "/");
    let mut out = PathBuf::new();
    for component in Path::new(&unified).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
