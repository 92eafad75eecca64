//! Application configuration options

use std::time::Duration;

use crate::deploy::orchestrator::DeployOptions;
use crate::deploy::strategy::StrategyOptions;
use crate::deploy::workspace::WorkspaceOptions;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;

/// Main application options
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage layout paths
    pub layout: StorageLayout,

    /// Server configuration
    pub server: ServerOptions,

    /// Workspace configuration
    pub workspaces: WorkspaceOptions,

    /// Build strategy configuration
    pub strategy: StrategyOptions,

    /// Orchestrator configuration
    pub deploy: DeployOptions,
}

impl AppOptions {
    /// Build options from a settings file
    pub fn from_settings(settings: &Settings, layout: StorageLayout) -> Self {
        Self {
            // Leave room for a deploy that is still running at shutdown.
            lifecycle: LifecycleOptions {
                max_shutdown_delay: settings.deploy.timeout()
                    + LifecycleOptions::default().max_shutdown_delay,
            },
            layout,
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            workspaces: WorkspaceOptions {
                root: settings.workspaces_root.clone(),
                git_bin: settings.deploy.git_bin.clone(),
                reclone_on_source_change: settings.deploy.reclone_on_source_change,
            },
            strategy: StrategyOptions {
                docker_bin: settings.deploy.docker_bin.clone(),
                shell: settings.deploy.shell.clone(),
            },
            deploy: DeployOptions {
                timeout: settings.deploy.timeout(),
                cleanup_timeout: settings.deploy.cleanup_timeout(),
                busy_policy: settings.deploy.busy_policy,
            },
        }
    }
}

/// Lifecycle options for the manager
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}
