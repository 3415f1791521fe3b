// Application state module
// Owns the live handler slot and the module builder

use std::sync::atomic::AtomicBool;

use super::types::Config;
use crate::plugin::{HandlerRegistry, ModuleBuilder};

/// Application state shared by every connection
pub struct AppState {
    pub config: Config,
    pub registry: HandlerRegistry,
    pub builder: ModuleBuilder,

    // Cached config value for fast access without locks
    pub cached_access_log: AtomicBool,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            registry: HandlerRegistry::new(),
            builder: ModuleBuilder::new(&config.build),
            cached_access_log: AtomicBool::new(config.logging.access_log),
        }
    }
}
