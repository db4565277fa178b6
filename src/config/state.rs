// Application state module
// Composition root shared by every connection task

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use config::ConfigError;

use super::types::Config;
use crate::handler::{AssetCache, Pipeline};

/// Application state
pub struct AppState {
    pub config: Arc<Config>,
    pub assets: Arc<AssetCache>,
    pub pipeline: Pipeline,
    pub active_connections: AtomicUsize,
}

impl AppState {
    /// Preload the critical assets and compose the request pipeline
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let config = Arc::new(config);
        let assets = Arc::new(AssetCache::for_config(&config));
        let pipeline = Pipeline::new(Arc::clone(&config), Arc::clone(&assets))?;

        Ok(Self {
            config,
            assets,
            pipeline,
            active_connections: AtomicUsize::new(0),
        })
    }
}
