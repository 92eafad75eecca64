//! Bot registry and deployment record storage

pub mod json;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::deploy::fsm::DeploymentStatus;
use crate::errors::ManagerError;
use crate::models::bot::{Bot, BotId, BotStatus, NewBot};
use crate::models::deployment::{Deployment, DeploymentId};

pub use json::JsonStore;

/// Durable storage for bots and their deployments
#[async_trait]
pub trait Store: Send + Sync {
    /// Register a bot (status `inactive`). Fails with `Conflict` on a taken domain.
    async fn insert_bot(&self, bot: NewBot) -> Result<Bot, ManagerError>;

    /// All bots, newest first
    async fn list_bots(&self) -> Result<Vec<Bot>, ManagerError>;

    async fn get_bot(&self, id: BotId) -> Result<Bot, ManagerError>;

    /// Write back the outcome of a deploy attempt
    async fn record_attempt(
        &self,
        id: BotId,
        status: BotStatus,
        attempted_at: DateTime<Utc>,
    ) -> Result<Bot, ManagerError>;

    /// Delete a bot and, with it, all its deployments
    async fn delete_bot(&self, id: BotId) -> Result<(), ManagerError>;

    /// Open a new `queued` deployment for the bot
    async fn insert_deployment(
        &self,
        bot_id: BotId,
        started_at: DateTime<Utc>,
    ) -> Result<Deployment, ManagerError>;

    /// Close a deployment. Only forward transitions are accepted.
    async fn finish_deployment(
        &self,
        id: DeploymentId,
        status: DeploymentStatus,
        log: String,
        finished_at: DateTime<Utc>,
    ) -> Result<Deployment, ManagerError>;

    async fn get_deployment(&self, id: DeploymentId) -> Result<Deployment, ManagerError>;

    /// A bot's deployments, newest first
    async fn list_deployments(&self, bot_id: BotId) -> Result<Vec<Deployment>, ManagerError>;
}
