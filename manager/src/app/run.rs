//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::deploy::runner::Runner;
use crate::errors::ManagerError;
use crate::server::serve::serve;
use crate::server::state::ServerState;

/// Run the bot manager until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    runner: Arc<dyn Runner>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ManagerError> {
    info!("Initializing bot manager...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager =
        ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, runner, &shutdown_tx, &mut shutdown_manager).await {
        error!("Failed to start bot manager: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    let server_exit = shutdown_manager.server_exit();
    tokio::select! {
        _ = shutdown_signal => {
            info!("Shutdown signal received, shutting down...");
        }
        _ = server_exit => {
            error!("HTTP server stopped unexpectedly, shutting down...");
        }
    }

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    runner: Arc<dyn Runner>,
    shutdown_tx: &broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), ManagerError> {
    let app_state = Arc::new(AppState::init(options, runner).await?);
    shutdown_manager.with_app_state(app_state.clone())?;

    init_socket_server(options, app_state, shutdown_manager, shutdown_tx.subscribe()).await
}

async fn init_socket_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), ManagerError> {
    info!("Initializing HTTP server...");

    let server_state = ServerState::from_app_state(&app_state);
    let server_handle = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_socket_server_handle(server_handle)?;
    Ok(())
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    socket_server_handle: Option<JoinHandle<Result<(), ManagerError>>>,
    server_exit_rx: Option<tokio::sync::oneshot::Receiver<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state: None,
            socket_server_handle: None,
            server_exit_rx: None,
        }
    }

    pub fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), ManagerError> {
        if self.app_state.is_some() {
            return Err(ManagerError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    /// Track the server task. A watcher reports when it stops on its own.
    pub fn with_socket_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), ManagerError>>,
    ) -> Result<(), ManagerError> {
        if self.socket_server_handle.is_some() {
            return Err(ManagerError::ShutdownError("server_handle already set".to_string()));
        }

        let (exit_tx, exit_rx) = tokio::sync::oneshot::channel();
        let watched = tokio::spawn(async move {
            let result = handle
                .await
                .map_err(|e| ManagerError::ShutdownError(e.to_string()))
                .and_then(|r| r);
            let _ = exit_tx.send(());
            result
        });

        self.socket_server_handle = Some(watched);
        self.server_exit_rx = Some(exit_rx);
        Ok(())
    }

    /// Resolves when the server task finishes; pending forever when no server runs
    pub fn server_exit(&mut self) -> BoxFuture<'static, ()> {
        match self.server_exit_rx.take() {
            Some(rx) => rx.map(|_| ()).boxed(),
            None => futures::future::pending::<()>().boxed(),
        }
    }

    pub async fn shutdown(&mut self) -> Result<(), ManagerError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), ManagerError> {
        info!("Shutting down bot manager...");

        // 1. Socket server: stops accepting, finishes in-flight requests
        if let Some(handle) = self.socket_server_handle.take() {
            handle
                .await
                .map_err(|e| ManagerError::ShutdownError(e.to_string()))??;
        }

        // 2. App state
        if let Some(app_state) = self.app_state.take() {
            app_state.shutdown().await?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
