//! In-memory store with optional JSON file persistence

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::deploy::fsm::DeploymentStatus;
use crate::errors::ManagerError;
use crate::filesys::file::File;
use crate::models::bot::{Bot, BotId, BotStatus, NewBot};
use crate::models::deployment::{Deployment, DeploymentId};
use crate::store::Store;

/// Everything the store holds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    last_bot_id: BotId,

    #[serde(default)]
    last_deployment_id: DeploymentId,

    #[serde(default)]
    bots: BTreeMap<BotId, Bot>,

    #[serde(default)]
    deployments: BTreeMap<DeploymentId, Deployment>,
}

impl StoreState {
    fn bot(&self, id: BotId) -> Result<&Bot, ManagerError> {
        self.bots
            .get(&id)
            .ok_or_else(|| ManagerError::NotFound(format!("bot {}", id)))
    }

    fn domain_taken(&self, domain: &str) -> bool {
        self.bots
            .values()
            .filter_map(|bot| bot.domain.as_deref())
            .any(|existing| existing.eq_ignore_ascii_case(domain))
    }
}

/// Store keeping its state in memory, optionally mirrored to a JSON file
///
/// Every mutation is applied to a copy, written atomically, then committed,
/// so the file and memory never disagree.
pub struct JsonStore {
    state: Mutex<StoreState>,
    file: Option<File>,
}

impl JsonStore {
    /// A store that lives only in memory
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            file: None,
        }
    }

    /// Open (or create) a store persisted to `file`
    pub async fn open(file: File) -> Result<Self, ManagerError> {
        let state = if file.exists().await {
            let state: StoreState = file.read_json().await.map_err(|e| {
                ManagerError::StorageError(format!(
                    "failed to load {}: {}",
                    file.path().display(),
                    e
                ))
            })?;
            info!(
                "Loaded {} bots and {} deployments from {}",
                state.bots.len(),
                state.deployments.len(),
                file.path().display()
            );
            state
        } else {
            debug!("No state file at {}, starting empty", file.path().display());
            StoreState::default()
        };

        Ok(Self {
            state: Mutex::new(state),
            file: Some(file),
        })
    }

    async fn read<R>(&self, f: impl FnOnce(&StoreState) -> Result<R, ManagerError>) -> Result<R, ManagerError> {
        let state = self.state.lock().await;
        f(&state)
    }

    async fn mutate<R>(
        &self,
        f: impl FnOnce(&mut StoreState) -> Result<R, ManagerError>,
    ) -> Result<R, ManagerError> {
        let mut state = self.state.lock().await;
        match &self.file {
            None => f(&mut state),
            Some(file) => {
                let mut next = state.clone();
                let result = f(&mut next)?;
                file.write_json(&next).await.map_err(|e| {
                    ManagerError::StorageError(format!(
                        "failed to write {}: {}",
                        file.path().display(),
                        e
                    ))
                })?;
                *state = next;
                Ok(result)
            }
        }
    }
}

#[async_trait]
impl Store for JsonStore {
    async fn insert_bot(&self, new: NewBot) -> Result<Bot, ManagerError> {
        self.mutate(|state| {
            if let Some(domain) = new.domain.as_deref() {
                if state.domain_taken(domain) {
                    return Err(ManagerError::Conflict(format!(
                        "domain {} is already used by another bot",
                        domain
                    )));
                }
            }

            state.last_bot_id += 1;
            let now = Utc::now();
            let bot = Bot {
                id: state.last_bot_id,
                name: new.name,
                github_repo_url: new.github_repo_url,
                github_branch: new.github_branch,
                service_type: new.service_type,
                deploy_command: new.deploy_command,
                domain: new.domain,
                environment: new.environment,
                status: BotStatus::Inactive,
                last_deployed_at: None,
                created_at: now,
                updated_at: now,
            };
            state.bots.insert(bot.id, bot.clone());
            Ok(bot)
        })
        .await
    }

    async fn list_bots(&self) -> Result<Vec<Bot>, ManagerError> {
        self.read(|state| {
            let mut bots: Vec<Bot> = state.bots.values().cloned().collect();
            bots.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(bots)
        })
        .await
    }

    async fn get_bot(&self, id: BotId) -> Result<Bot, ManagerError> {
        self.read(|state| state.bot(id).cloned()).await
    }

    async fn record_attempt(
        &self,
        id: BotId,
        status: BotStatus,
        attempted_at: DateTime<Utc>,
    ) -> Result<Bot, ManagerError> {
        self.mutate(|state| {
            let bot = state
                .bots
                .get_mut(&id)
                .ok_or_else(|| ManagerError::NotFound(format!("bot {}", id)))?;
            bot.status = status;
            bot.last_deployed_at = Some(attempted_at);
            bot.updated_at = Utc::now();
            Ok(bot.clone())
        })
        .await
    }

    async fn delete_bot(&self, id: BotId) -> Result<(), ManagerError> {
        self.mutate(|state| {
            state
                .bots
                .remove(&id)
                .ok_or_else(|| ManagerError::NotFound(format!("bot {}", id)))?;
            state.deployments.retain(|_, d| d.bot_id != id);
            Ok(())
        })
        .await
    }

    async fn insert_deployment(
        &self,
        bot_id: BotId,
        started_at: DateTime<Utc>,
    ) -> Result<Deployment, ManagerError> {
        self.mutate(|state| {
            state.bot(bot_id)?;
            state.last_deployment_id += 1;
            let deployment = Deployment {
                id: state.last_deployment_id,
                bot_id,
                status: DeploymentStatus::Queued,
                started_at: Some(started_at),
                finished_at: None,
                log: None,
                created_at: Utc::now(),
            };
            state.deployments.insert(deployment.id, deployment.clone());
            Ok(deployment)
        })
        .await
    }

    async fn finish_deployment(
        &self,
        id: DeploymentId,
        status: DeploymentStatus,
        log: String,
        finished_at: DateTime<Utc>,
    ) -> Result<Deployment, ManagerError> {
        self.mutate(|state| {
            let deployment = state
                .deployments
                .get_mut(&id)
                .ok_or_else(|| ManagerError::NotFound(format!("deployment {}", id)))?;
            if !deployment.status.can_transition_to(status) {
                return Err(ManagerError::Conflict(format!(
                    "deployment {} cannot move from {} to {}",
                    id, deployment.status, status
                )));
            }
            deployment.status = status;
            deployment.log = Some(log);
            deployment.finished_at = Some(finished_at);
            Ok(deployment.clone())
        })
        .await
    }

    async fn get_deployment(&self, id: DeploymentId) -> Result<Deployment, ManagerError> {
        self.read(|state| {
            state
                .deployments
                .get(&id)
                .cloned()
                .ok_or_else(|| ManagerError::NotFound(format!("deployment {}", id)))
        })
        .await
    }

    async fn list_deployments(&self, bot_id: BotId) -> Result<Vec<Deployment>, ManagerError> {
        self.read(|state| {
            state.bot(bot_id)?;
            let mut deployments: Vec<Deployment> = state
                .deployments
                .values()
                .filter(|d| d.bot_id == bot_id)
                .cloned()
                .collect();
            deployments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(deployments)
        })
        .await
    }
}
