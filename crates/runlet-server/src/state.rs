//! Application state

use std::sync::Arc;

use runlet_core::ServiceConfig;

use crate::orchestrator::Orchestrator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(config: ServiceConfig, node_version: String) -> Self {
        let config = Arc::new(config);
        let orchestrator = Arc::new(Orchestrator::new(config.clone(), node_version));
        Self {
            config,
            orchestrator,
        }
    }
}
