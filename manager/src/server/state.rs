//! Server state

use std::sync::Arc;

use crate::app::state::AppState;
use crate::deploy::orchestrator::Deployer;
use crate::registry::Registry;

/// Server state shared across handlers
pub struct ServerState {
    pub registry: Arc<Registry>,
    pub deployer: Arc<Deployer>,
}

impl ServerState {
    pub fn new(registry: Arc<Registry>, deployer: Arc<Deployer>) -> Self {
        Self { registry, deployer }
    }

    pub fn from_app_state(app_state: &AppState) -> Self {
        Self::new(app_state.registry.clone(), app_state.deployer.clone())
    }
}
