//! Application state shared by all handlers.

use std::sync::Arc;

use stowage_core::Config;
use stowage_processing::ThumbnailDeriver;
use stowage_storage::{create_storage, Storage};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn Storage>,
    pub thumbnails: ThumbnailDeriver,
}

impl AppState {
    /// Build the storage backend and thumbnail deriver for a configuration.
    pub async fn new(config: Config) -> Result<Arc<Self>, anyhow::Error> {
        let storage = create_storage(&config).await?;
        let thumbnails = ThumbnailDeriver::from_config(storage.clone(), &config);

        Ok(Arc::new(Self {
            config,
            storage,
            thumbnails,
        }))
    }
}
