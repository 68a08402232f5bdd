use std::sync::Arc;

use filestore::Storage;
use survey::Dataset;

use crate::config::AppConfig;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    /// Immutable after startup.
    pub dataset: Arc<Dataset>,
    pub store: Arc<dyn Storage>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(dataset: Dataset, store: Arc<dyn Storage>, config: AppConfig) -> Self {
        Self {
            dataset: Arc::new(dataset),
            store,
            config,
        }
    }
}
