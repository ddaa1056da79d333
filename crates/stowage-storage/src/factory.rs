use crate::{LocalStorage, Storage, StorageResult};
use std::sync::Arc;
use stowage_core::Config;

/// Create the storage backend described by the configuration
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let storage = LocalStorage::new(
        config.upload_base_path(),
        config.upload_base_url().to_string(),
    )
    .await?;

    tracing::info!(
        base_path = %config.upload_base_path().display(),
        base_url = %config.upload_base_url(),
        "Local upload storage ready"
    );

    Ok(Arc::new(storage))
}
