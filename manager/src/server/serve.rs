//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::ManagerError;
use crate::server::handlers::{
    create_bot_handler, delete_all_bots_handler, delete_bot_handler, deploy_bot_handler,
    get_deployment_handler, health_handler, list_bots_handler, list_deployments_handler,
    show_bot_handler, update_all_handler, version_handler,
};
use crate::server::state::ServerState;

/// Build the application router
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Bots
        .route(
            "/bots",
            get(list_bots_handler)
                .post(create_bot_handler)
                .delete(delete_all_bots_handler),
        )
        .route("/bots/update-all", post(update_all_handler))
        .route("/bots/{id}", get(show_bot_handler).delete(delete_bot_handler))
        .route("/bots/{id}/deploy", post(deploy_bot_handler))
        .route("/bots/{id}/deployments", get(list_deployments_handler))
        // Deployments
        .route("/deployments/{id}", get(get_deployment_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), ManagerError>>, ManagerError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ManagerError::ServerError(format!("failed to bind {}: {}", addr, e)))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ManagerError::ServerError(e.to_string()))
    });

    Ok(handle)
}
