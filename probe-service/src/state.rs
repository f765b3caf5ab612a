//! Application state for the probe service.

use std::sync::Arc;

use common::config::AppConfig;

use crate::service::ProbeService;
use crate::source::ConnectionSource;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub source: Arc<dyn ConnectionSource>,
    pub probes: Arc<ProbeService>,
}

impl AppState {
    /// Creates a new application state around an injected connection source.
    pub fn new(config: AppConfig, source: Arc<dyn ConnectionSource>) -> Self {
        Self {
            probes: Arc::new(ProbeService::new(source.clone())),
            source,
            config,
        }
    }
}
