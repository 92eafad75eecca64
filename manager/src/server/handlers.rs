//! HTTP request handlers

use std::sync::Arc;

use api_models::models::{
    CreateBotRequest, DataEnvelope, HealthResponse, StatusResponse, VersionResponse,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::errors::ManagerError;
use crate::models::bot::BotId;
use crate::models::deployment::DeploymentId;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "bothandler".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

// ================================== BOTS ======================================= //

pub async fn list_bots_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<impl IntoResponse, ManagerError> {
    let bots = state.registry.list().await?;
    Ok(Json(DataEnvelope::new(bots)))
}

pub async fn create_bot_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<CreateBotRequest>,
) -> Result<impl IntoResponse, ManagerError> {
    let bot = state.registry.create(request).await?;
    Ok((StatusCode::CREATED, Json(DataEnvelope::new(bot))))
}

pub async fn show_bot_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<BotId>,
) -> Result<impl IntoResponse, ManagerError> {
    let details = state.registry.show(id).await?;
    Ok(Json(DataEnvelope::new(details)))
}

pub async fn delete_bot_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<BotId>,
) -> Result<impl IntoResponse, ManagerError> {
    state.registry.delete(id).await?;
    Ok(Json(StatusResponse::deleted()))
}

pub async fn delete_all_bots_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<impl IntoResponse, ManagerError> {
    state.registry.delete_all().await?;
    Ok(Json(StatusResponse::deleted()))
}

// =============================== DEPLOYMENTS ==================================== //

/// Run one deploy attempt. A failed build is still `202` with a `failed` record.
pub async fn deploy_bot_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<BotId>,
) -> Result<impl IntoResponse, ManagerError> {
    let deployment = state.deployer.deploy_by_id(id).await?;
    Ok((StatusCode::ACCEPTED, Json(DataEnvelope::new(deployment))))
}

pub async fn update_all_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<impl IntoResponse, ManagerError> {
    let report = state.deployer.deploy_all().await?;
    Ok((StatusCode::ACCEPTED, Json(DataEnvelope::new(report))))
}

pub async fn list_deployments_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<BotId>,
) -> Result<impl IntoResponse, ManagerError> {
    let deployments = state.deployer.store().list_deployments(id).await?;
    Ok(Json(DataEnvelope::new(deployments)))
}

pub async fn get_deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<DeploymentId>,
) -> Result<impl IntoResponse, ManagerError> {
    let deployment = state.deployer.store().get_deployment(id).await?;
    Ok(Json(DataEnvelope::new(deployment)))
}
