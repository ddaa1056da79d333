//! Configuration module
//!
//! This module provides configuration structures for the thumbnail service and
//! the upload behaviors built from it: server settings, the upload base path and
//! URL, thumbnail size allow-list and remote fetch limits.

use std::env;
use std::path::PathBuf;

use regex::Regex;

const DEFAULT_PORT: u16 = 4000;
const DEFAULT_ORIGINAL_FOLDER: &str = "original";
const REMOTE_FETCH_TIMEOUT_SECS: u64 = 30;
const MAX_REMOTE_FILE_SIZE_MB: usize = 20;
const MAX_THUMBNAIL_DIMENSION: u32 = 4096;

/// Base configuration shared by the API server and the CLI
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
}

/// Upload and thumbnail configuration
#[derive(Clone, Debug)]
pub struct StowageConfig {
    pub base: BaseConfig,
    /// Filesystem root that every link is resolved against
    pub upload_base_path: PathBuf,
    /// Public URL prefix matching `upload_base_path`
    pub upload_base_url: String,
    /// Folder under the base path holding image originals
    pub original_folder: String,
    /// Allowed thumbnail sizes as `{w}x{h}`. Empty means any size.
    pub thumbnail_sizes: Vec<String>,
    /// Largest width or height a derived thumbnail may have
    pub max_thumbnail_dimension: u32,
    pub fix_image_orientation: bool,
    pub remote_fetch_timeout_secs: u64,
    // If set, only URLs from these hosts are accepted for URL uploads
    pub url_upload_allowlist: Option<Vec<String>>,
    pub max_remote_file_size_bytes: usize,
}

impl Default for StowageConfig {
    fn default() -> Self {
        Self {
            base: BaseConfig {
                server_port: DEFAULT_PORT,
                cors_origins: vec!["*".to_string()],
                environment: "development".to_string(),
            },
            upload_base_path: PathBuf::from("./uploads"),
            upload_base_url: "/uploads".to_string(),
            original_folder: DEFAULT_ORIGINAL_FOLDER.to_string(),
            thumbnail_sizes: Vec::new(),
            max_thumbnail_dimension: MAX_THUMBNAIL_DIMENSION,
            fix_image_orientation: false,
            remote_fetch_timeout_secs: REMOTE_FETCH_TIMEOUT_SECS,
            url_upload_allowlist: None,
            max_remote_file_size_bytes: MAX_REMOTE_FILE_SIZE_MB * 1024 * 1024,
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<StowageConfig>);

impl Config {
    fn as_stowage(&self) -> &StowageConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.as_stowage().base.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = StowageConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_stowage().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.as_stowage().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_stowage().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.as_stowage().base.environment
    }

    pub fn upload_base_path(&self) -> &std::path::Path {
        &self.as_stowage().upload_base_path
    }

    pub fn upload_base_url(&self) -> &str {
        &self.as_stowage().upload_base_url
    }

    pub fn original_folder(&self) -> &str {
        &self.as_stowage().original_folder
    }

    pub fn thumbnail_sizes(&self) -> &[String] {
        &self.as_stowage().thumbnail_sizes
    }

    pub fn max_thumbnail_dimension(&self) -> u32 {
        self.as_stowage().max_thumbnail_dimension
    }

    pub fn fix_image_orientation(&self) -> bool {
        self.as_stowage().fix_image_orientation
    }

    pub fn remote_fetch_timeout_secs(&self) -> u64 {
        self.as_stowage().remote_fetch_timeout_secs
    }

    pub fn url_upload_allowlist(&self) -> Option<&[String]> {
        self.as_stowage().url_upload_allowlist.as_deref()
    }

    pub fn max_remote_file_size_bytes(&self) -> usize {
        self.as_stowage().max_remote_file_size_bytes
    }
}

impl From<StowageConfig> for Config {
    fn from(config: StowageConfig) -> Self {
        Config(Box::new(config))
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl StowageConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins: split_list(&cors_origins_str),
            environment,
        };

        let upload_base_path = env::var("UPLOAD_BASE_PATH")
            .map(PathBuf::from)
            .map_err(|_| anyhow::anyhow!("UPLOAD_BASE_PATH must be set"))?;

        let config = StowageConfig {
            base,
            upload_base_path,
            upload_base_url: env::var("UPLOAD_BASE_URL")
                .unwrap_or_else(|_| "/uploads".to_string())
                .trim_end_matches('/')
                .to_string(),
            original_folder: env::var("ORIGINAL_FOLDER")
                .unwrap_or_else(|_| DEFAULT_ORIGINAL_FOLDER.to_string()),
            thumbnail_sizes: env::var("THUMBNAIL_SIZES")
                .map(|s| split_list(&s.to_lowercase()))
                .unwrap_or_default(),
            max_thumbnail_dimension: env::var("MAX_THUMBNAIL_DIMENSION")
                .unwrap_or_else(|_| MAX_THUMBNAIL_DIMENSION.to_string())
                .parse()
                .map_err(|_| {
                    anyhow::anyhow!("MAX_THUMBNAIL_DIMENSION must be a valid number")
                })?,
            fix_image_orientation: env::var("FIX_IMAGE_ORIENTATION")
                .unwrap_or_else(|_| "false".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(false),
            remote_fetch_timeout_secs: env::var("REMOTE_FETCH_TIMEOUT_SECS")
                .unwrap_or_else(|_| REMOTE_FETCH_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(REMOTE_FETCH_TIMEOUT_SECS),
            url_upload_allowlist: env::var("URL_UPLOAD_ALLOWLIST").ok().map(|s| {
                s.split(',')
                    .map(|domain| domain.trim().to_lowercase())
                    .filter(|domain| !domain.is_empty())
                    .collect()
            }),
            max_remote_file_size_bytes: env::var("MAX_REMOTE_FILE_SIZE_MB")
                .unwrap_or_else(|_| MAX_REMOTE_FILE_SIZE_MB.to_string())
                .parse::<usize>()
                .unwrap_or(MAX_REMOTE_FILE_SIZE_MB)
                * 1024
                * 1024,
        };

        tracing::debug!(
            base_path = %config.upload_base_path.display(),
            sizes = config.thumbnail_sizes.len(),
            "Loaded upload configuration"
        );

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.upload_base_path.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("UPLOAD_BASE_PATH must not be empty"));
        }

        if self.original_folder.trim().is_empty()
            || self.original_folder.contains("..")
            || self.original_folder.contains('/')
        {
            return Err(anyhow::anyhow!(
                "ORIGINAL_FOLDER must be a single folder name"
            ));
        }

        let size_pattern = Regex::new(r"^\d+x\d+$")?;
        if let Some(bad) = self
            .thumbnail_sizes
            .iter()
            .find(|size| !size_pattern.is_match(size))
        {
            return Err(anyhow::anyhow!(
                "THUMBNAIL_SIZES entry '{}' must look like '{{width}}x{{height}}'",
                bad
            ));
        }

        if self.max_thumbnail_dimension == 0 {
            return Err(anyhow::anyhow!(
                "MAX_THUMBNAIL_DIMENSION must be greater than zero"
            ));
        }

        if self.remote_fetch_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "REMOTE_FETCH_TIMEOUT_SECS must be greater than zero"
            ));
        }

        Ok(())
    }
}
