//! Deployment models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::deploy::fsm::DeploymentStatus;
use crate::models::bot::BotId;

/// Deployment identifier
pub type DeploymentId = u64;

/// One recorded attempt to build and run a bot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    /// Unique deployment ID
    pub id: DeploymentId,

    /// Owning bot
    pub bot_id: BotId,

    /// Current status
    pub status: DeploymentStatus,

    /// When the orchestrator picked the attempt up
    pub started_at: Option<DateTime<Utc>>,

    /// When the process chain finished
    pub finished_at: Option<DateTime<Utc>>,

    /// Combined captured output, set once finished
    pub log: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Deployment {
    /// Whether the attempt has reached a final status
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}
