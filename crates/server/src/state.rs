use std::sync::Arc;
use logdrop_core::{Config, Placer};

/// Shared application state
pub struct AppState {
    config: Config,
    placer: Arc<dyn Placer>,
}

impl AppState {
    pub fn new(config: Config, placer: Arc<dyn Placer>) -> Self {
        Self { config, placer }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn placer(&self) -> &dyn Placer {
        self.placer.as_ref()
    }
}
