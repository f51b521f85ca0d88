//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::ArenaRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<ArenaRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(ArenaRegistry::new()),
        }
    }
}
