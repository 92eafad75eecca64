//! Application state management

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::app::options::AppOptions;
use crate::deploy::orchestrator::Deployer;
use crate::deploy::runner::Runner;
use crate::deploy::workspace::WorkspaceManager;
use crate::errors::ManagerError;
use crate::registry::Registry;
use crate::store::{JsonStore, Store};

/// Main application state
pub struct AppState {
    /// Bot and deployment records
    pub store: Arc<dyn Store>,

    /// Deploy orchestrator
    pub deployer: Arc<Deployer>,

    /// Bot registry
    pub registry: Arc<Registry>,
}

impl AppState {
    /// Initialize application state, loading persisted records from the
    /// layout's state file
    pub async fn init(options: &AppOptions, runner: Arc<dyn Runner>) -> Result<Self, ManagerError> {
        info!("Initializing application state...");

        let base_dir = options.layout.base_dir.display();
        options
            .layout
            .setup()
            .await
            .with_context(|| format!("failed to prepare data directory {}", base_dir))?;
        let state_file = options.layout.state_file();
        let store = JsonStore::open(state_file.clone())
            .await
            .with_context(|| format!("failed to load state file {}", state_file.path().display()))?;
        let store = Arc::new(store);

        Ok(Self::new(options, store, runner))
    }

    /// Wire the state around an existing store
    pub fn new(options: &AppOptions, store: Arc<dyn Store>, runner: Arc<dyn Runner>) -> Self {
        let deployer = Arc::new(Deployer::new(
            store.clone(),
            runner,
            WorkspaceManager::new(options.workspaces.clone()),
            options.strategy.clone(),
            options.deploy.clone(),
        ));
        let registry = Arc::new(Registry::new(deployer.clone()));

        Self {
            store,
            deployer,
            registry,
        }
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), ManagerError> {
        info!("Shutting down application state...");
        // Take every deploy slot so no attempt is cut off mid-write.
        self.deployer.locks().drain().await;
        Ok(())
    }
}
