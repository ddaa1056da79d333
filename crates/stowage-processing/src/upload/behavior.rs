//! Upload behavior attached to host records
//!
//! An `UploadBehavior` carries the per-record state of one or more file
//! attributes. The host drives it through three stages:
//!
//! 1. `normalize_intake` before validation, turning raw values into files
//! 2. `persist` after the record is saved and its primary key is known
//! 3. `delete_artifacts` before the record is deleted
//!
//! Failures are attached to the owning record as field errors so that one
//! broken attribute never blocks its siblings.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use stowage_core::{
    AppError, Config, ErrorMessages, ErrorMetadata, PlacementPolicy, StoredFile, UploadListener,
    UploadOwner, UploadValue, UploadedFile,
};
use stowage_storage::{Storage, StorageError, TransferMode};

use super::intake::UploadIntake;
use crate::image::ImageOrientation;

/// Settings for behaviors that store images
#[derive(Debug, Clone)]
pub struct ImageOptions {
    /// Folder holding originals, next to the `{width}x{height}` variants
    pub original_folder: String,
    /// Rotate JPEG uploads upright according to their EXIF orientation
    pub fix_orientation: bool,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            original_folder: "original".to_string(),
            fix_orientation: false,
        }
    }
}

impl ImageOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            original_folder: config.original_folder().to_string(),
            fix_orientation: config.fix_image_orientation(),
        }
    }
}

#[derive(Debug)]
struct BehaviorSettings {
    attributes: Vec<String>,
    scenarios: Vec<String>,
    policy: PlacementPolicy,
    handle_non_multipart: bool,
    delete_with_owner: bool,
    delete_temp_file: bool,
    image: Option<ImageOptions>,
    messages: ErrorMessages,
}

pub struct UploadBehaviorBuilder {
    storage: Arc<dyn Storage>,
    intake: Option<UploadIntake>,
    attributes: Vec<String>,
    scenarios: Vec<String>,
    policy: PlacementPolicy,
    handle_non_multipart: bool,
    delete_with_owner: bool,
    delete_temp_file: bool,
    image: Option<ImageOptions>,
    messages: ErrorMessages,
}

impl UploadBehaviorBuilder {
    fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            intake: None,
            attributes: Vec::new(),
            scenarios: Vec::new(),
            policy: PlacementPolicy::default(),
            handle_non_multipart: false,
            delete_with_owner: true,
            delete_temp_file: true,
            image: None,
            messages: ErrorMessages::default(),
        }
    }

    pub fn attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the attributes from a comma-separated list such as `"image, cover"`.
    pub fn attribute_list(self, list: &str) -> Self {
        self.attributes(list.split(','))
    }

    /// Restrict intake to these scenarios. An empty list means every scenario.
    pub fn scenarios<I, S>(mut self, scenarios: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scenarios = scenarios.into_iter().map(Into::into).collect();
        self
    }

    pub fn policy(mut self, policy: PlacementPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn intake(mut self, intake: UploadIntake) -> Self {
        self.intake = Some(intake);
        self
    }

    /// Accept remote URLs, data URIs and server paths in addition to multipart uploads.
    pub fn handle_non_multipart(mut self, enabled: bool) -> Self {
        self.handle_non_multipart = enabled;
        self
    }

    pub fn delete_with_owner(mut self, enabled: bool) -> Self {
        self.delete_with_owner = enabled;
        self
    }

    /// Move the source into place instead of copying it.
    pub fn delete_temp_file(mut self, enabled: bool) -> Self {
        self.delete_temp_file = enabled;
        self
    }

    pub fn image(mut self, options: ImageOptions) -> Self {
        self.image = Some(options);
        self
    }

    pub fn messages(mut self, messages: ErrorMessages) -> Self {
        self.messages = messages;
        self
    }

    pub fn build(self) -> Result<UploadBehavior, AppError> {
        let attributes: Vec<String> = self
            .attributes
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        if attributes.is_empty() {
            return Err(AppError::InvalidConfiguration(
                "At least one file attribute is required".to_string(),
            ));
        }

        let intake = match self.intake {
            Some(intake) => intake,
            None => UploadIntake::with_defaults()?,
        };

        let settings = BehaviorSettings {
            attributes,
            scenarios: self.scenarios,
            policy: self.policy,
            handle_non_multipart: self.handle_non_multipart,
            delete_with_owner: self.delete_with_owner,
            delete_temp_file: self.delete_temp_file,
            image: self.image,
            messages: self.messages,
        };

        Ok(UploadBehavior {
            settings: Arc::new(settings),
            storage: self.storage,
            intake,
            pending: HashMap::new(),
            files: HashMap::new(),
        })
    }
}

/// File upload state of a single host record
pub struct UploadBehavior {
    settings: Arc<BehaviorSettings>,
    storage: Arc<dyn Storage>,
    intake: UploadIntake,
    /// Raw values set by the host, waiting for intake
    pending: HashMap<String, UploadValue>,
    /// Normalized files waiting to be persisted
    files: HashMap<String, UploadedFile>,
}

impl UploadBehavior {
    pub fn builder(storage: Arc<dyn Storage>) -> UploadBehaviorBuilder {
        UploadBehaviorBuilder::new(storage)
    }

    /// A builder whose intake uses the remote fetch timeout, host allow-list
    /// and size limit of `config`.
    pub fn builder_from_config(
        storage: Arc<dyn Storage>,
        config: &Config,
    ) -> Result<UploadBehaviorBuilder, AppError> {
        Ok(UploadBehaviorBuilder::new(storage).intake(UploadIntake::from_config(config)?))
    }

    /// A behavior with the same settings and no per-record state.
    pub fn for_record(&self) -> Self {
        Self {
            settings: Arc::clone(&self.settings),
            storage: Arc::clone(&self.storage),
            intake: self.intake.clone(),
            pending: HashMap::new(),
            files: HashMap::new(),
        }
    }

    pub fn attributes(&self) -> &[String] {
        &self.settings.attributes
    }

    pub fn is_image(&self) -> bool {
        self.settings.image.is_some()
    }

    fn ensure_attribute(&self, attribute: &str) -> Result<(), AppError> {
        if self.settings.attributes.iter().any(|a| a == attribute) {
            Ok(())
        } else {
            Err(AppError::InvalidInput(format!(
                "Unknown file attribute '{}'",
                attribute
            )))
        }
    }

    /// Set the raw upload value of an attribute, replacing any earlier one.
    pub fn set_upload_value(
        &mut self,
        attribute: &str,
        value: impl Into<UploadValue>,
    ) -> Result<(), AppError> {
        self.ensure_attribute(attribute)?;
        self.files.remove(attribute);
        self.pending.insert(attribute.to_string(), value.into());
        Ok(())
    }

    /// Raw value waiting for intake, if any
    pub fn upload_value(&self, attribute: &str) -> Option<&UploadValue> {
        self.pending.get(attribute)
    }

    /// Normalized file waiting to be persisted, if any
    pub fn pending_file(&self, attribute: &str) -> Option<&UploadedFile> {
        self.files.get(attribute)
    }

    fn is_active_for(&self, owner: &dyn UploadOwner) -> bool {
        let scenarios = &self.settings.scenarios;
        scenarios.is_empty()
            || owner
                .scenario()
                .is_some_and(|scenario| scenarios.iter().any(|s| s == scenario))
    }

    fn report(&self, owner: &mut dyn UploadOwner, attribute: &str, err: &AppError) {
        tracing::warn!(
            model = %owner.model_name(),
            attribute = %attribute,
            error_code = %err.error_code(),
            error = %err,
            "Upload failed"
        );
        owner.add_error(attribute, self.settings.messages.render(err));
    }

    /// Normalize the pending raw values into files.
    ///
    /// Runs only when the owner's scenario is enabled. Returns `false` when
    /// any attribute received a field error.
    pub async fn normalize_intake(&mut self, owner: &mut dyn UploadOwner) -> bool {
        if !self.is_active_for(owner) {
            return true;
        }

        let settings = Arc::clone(&self.settings);
        let mut ok = true;

        for attribute in &settings.attributes {
            let Some(value) = self.pending.remove(attribute) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }

            let result = self
                .intake
                .normalize(value, settings.handle_non_multipart)
                .await
                .and_then(|file| file.ok_or(AppError::UnhandledUpload));

            match result {
                Ok(file) => {
                    self.files.insert(attribute.clone(), file);
                }
                Err(err) => {
                    self.report(owner, attribute, &err);
                    ok = false;
                }
            }
        }

        ok
    }

    /// Resolve the link a file would be stored under.
    pub fn resolve_link(
        &self,
        owner: &dyn UploadOwner,
        attribute: &str,
        file: &UploadedFile,
    ) -> String {
        stowage_storage::resolve_link(owner, attribute, file, &self.settings.policy)
    }

    /// Storage key of a link. Image originals live under the original folder.
    pub fn storage_key(&self, link: &str) -> String {
        match &self.settings.image {
            Some(image) => format!("{}/{}", image.original_folder, link),
            None => link.to_string(),
        }
    }

    pub fn file_path(&self, link: &str) -> Result<PathBuf, AppError> {
        Ok(self.storage.resolve(&self.storage_key(link))?)
    }

    /// Public URL of a link. `size` selects a `{width}x{height}` variant of an image.
    pub fn file_url(&self, link: &str, size: Option<&str>) -> String {
        match &self.settings.image {
            Some(image) => {
                let folder = size.unwrap_or(&image.original_folder);
                self.storage.url_for(&format!("{}/{}", folder, link))
            }
            None => self.storage.url_for(link),
        }
    }

    fn transfer_mode(&self, file: &UploadedFile) -> Option<TransferMode> {
        if !file.is_multipart() && !self.settings.handle_non_multipart {
            return None;
        }
        Some(if self.settings.delete_temp_file {
            TransferMode::Move
        } else {
            TransferMode::Copy
        })
    }

    /// Store every pending file and write its link back onto the owner.
    ///
    /// Call once the owner's primary key is known. Returns the files that
    /// were stored; failed attributes get a field error and keep their value.
    pub async fn persist(
        &mut self,
        owner: &mut dyn UploadOwner,
        listener: &dyn UploadListener,
    ) -> Vec<StoredFile> {
        let settings = Arc::clone(&self.settings);
        let mut stored = Vec::new();

        for attribute in &settings.attributes {
            let Some(file) = self.files.remove(attribute) else {
                continue;
            };

            match self.persist_file(owner, listener, attribute, file).await {
                Ok(file) => stored.push(file),
                Err(err) => self.report(owner, attribute, &err),
            }
        }

        stored
    }

    async fn persist_file(
        &self,
        owner: &mut dyn UploadOwner,
        listener: &dyn UploadListener,
        attribute: &str,
        file: UploadedFile,
    ) -> Result<StoredFile, AppError> {
        let link = self.resolve_link(owner, attribute, &file);
        let key = self.storage_key(&link);

        listener.before_upload(owner, attribute);

        self.storage.ensure_dir_for(&key).await?;

        let mode = self.transfer_mode(&file).ok_or_else(|| {
            AppError::SaveFailed(format!("{} upload is not accepted", file.kind()))
        })?;

        let size = self
            .storage
            .store_file(file.path(), &key, mode)
            .await
            .map_err(|e| match e {
                StorageError::DirectoryCreateFailed(directory) => {
                    AppError::DirectoryCreateFailed { directory }
                }
                other => AppError::SaveFailed(other.to_string()),
            })?;

        if let Some(previous) = owner.attribute(attribute) {
            if !previous.is_empty() && previous != link {
                if let Err(e) = self.storage.delete(&self.storage_key(&previous)).await {
                    tracing::warn!(
                        attribute = %attribute,
                        link = %previous,
                        error = %e,
                        "Failed to delete previous file"
                    );
                }
            }
        }

        if let Some(image) = &self.settings.image {
            if image.fix_orientation && file.content_type() == Some("image/jpeg") {
                if let Err(e) = ImageOrientation::fix_stored(self.storage.as_ref(), &key).await {
                    tracing::warn!(key = %key, error = %e, "Failed to fix image orientation");
                }
            }
        }

        let path = self.storage.resolve(&key)?;
        let url = self.storage.url_for(&key);

        owner.set_attribute(attribute, link.clone());
        listener.after_upload(owner, attribute);

        tracing::info!(
            model = %owner.model_name(),
            attribute = %attribute,
            link = %link,
            size_bytes = size,
            "Upload persisted"
        );

        Ok(StoredFile { link, path, url })
    }

    /// Delete the stored file of an attribute. Empty or missing files are a no-op.
    pub async fn delete_file(
        &self,
        owner: &dyn UploadOwner,
        attribute: &str,
    ) -> Result<(), AppError> {
        let Some(link) = owner.attribute(attribute).filter(|l| !l.is_empty()) else {
            return Ok(());
        };
        self.storage.delete(&self.storage_key(&link)).await?;
        Ok(())
    }

    /// Delete every attribute's file when the behavior deletes with its owner.
    pub async fn delete_artifacts(&self, owner: &dyn UploadOwner) {
        if !self.settings.delete_with_owner {
            return;
        }

        for attribute in &self.settings.attributes {
            if let Err(e) = self.delete_file(owner, attribute).await {
                tracing::warn!(attribute = %attribute, error = %e, "Failed to delete file");
            }
        }
    }
}
