// Application state module
// Read-only state shared by every connection task

use std::sync::Arc;

use super::types::Config;
use crate::storage::StorageRoot;

/// Application state
pub struct AppState {
    pub config: Config,
    pub storage: StorageRoot,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let storage = StorageRoot::new(&config.storage.root).with_dir_mode(config.storage.dir_mode);
        Self { config, storage }
    }

    pub fn shared(config: Config) -> Arc<Self> {
        Arc::new(Self::new(config))
    }
}
