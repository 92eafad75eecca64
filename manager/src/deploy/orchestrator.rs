//! Deployment orchestrator
//!
//! One call to [`Deployer::deploy`] is one auditable attempt:
//!
//! 1. take the bot's deploy slot
//! 2. open a `queued` deployment record
//! 3. prepare the workspace and run the git sync step
//! 4. classify the synced project and run its strategy steps
//! 5. write the outcome back to the bot (`active`/`error`, attempt time)
//! 6. close the record (`success`/`failed`, combined log, finish time)
//!
//! The whole chain shares one wall-clock budget. Build failures are data,
//! not errors; only infrastructure faults make `deploy` return `Err`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::deploy::docker;
use crate::deploy::fsm::DeploymentStatus;
use crate::deploy::locks::{BusyPolicy, DeployLocks};
use crate::deploy::runner::{execute_chain, ChainReport, Runner, DEFAULT_TIMEOUT};
use crate::deploy::strategy::{select_steps, ProjectKind, StrategyOptions};
use crate::deploy::workspace::WorkspaceManager;
use crate::errors::ManagerError;
use crate::models::bot::{service_name, Bot, BotId, BotStatus};
use crate::models::deployment::{Deployment, DeploymentId};
use crate::store::Store;

/// Orchestrator options
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Budget for the whole sync + build + run chain
    pub timeout: Duration,

    /// Budget for best-effort container removal
    pub cleanup_timeout: Duration,

    /// Behaviour when the bot already has a deploy in flight
    pub busy_policy: BusyPolicy,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            cleanup_timeout: Duration::from_secs(30),
            busy_policy: BusyPolicy::Wait,
        }
    }
}

/// Drives deploy attempts
pub struct Deployer {
    store: Arc<dyn Store>,
    runner: Arc<dyn Runner>,
    workspaces: WorkspaceManager,
    strategy: StrategyOptions,
    locks: DeployLocks,
    options: DeployOptions,
}

impl Deployer {
    pub fn new(
        store: Arc<dyn Store>,
        runner: Arc<dyn Runner>,
        workspaces: WorkspaceManager,
        strategy: StrategyOptions,
        options: DeployOptions,
    ) -> Self {
        Self {
            store,
            runner,
            workspaces,
            strategy,
            locks: DeployLocks::new(),
            options,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn locks(&self) -> &DeployLocks {
        &self.locks
    }

    pub fn options(&self) -> &DeployOptions {
        &self.options
    }

    /// Deploy the bot with the given id
    pub async fn deploy_by_id(&self, bot_id: BotId) -> Result<Deployment, ManagerError> {
        let bot = self.store.get_bot(bot_id).await?;
        self.deploy(&bot).await
    }

    /// Run one deploy attempt for `bot` and return its finished record
    pub async fn deploy(&self, bot: &Bot) -> Result<Deployment, ManagerError> {
        let _slot = self
            .locks
            .acquire_with(bot.id, self.options.busy_policy)
            .await?;

        // The definition may have changed (or vanished) while queued for the slot.
        let bot = self.store.get_bot(bot.id).await?;

        let deployment = self.store.insert_deployment(bot.id, Utc::now()).await?;
        info!(
            bot_id = bot.id,
            deployment_id = deployment.id,
            "Deploying bot {} ({}@{})",
            bot.name,
            bot.github_repo_url,
            bot.github_branch
        );

        let report = match self.execute(&bot).await {
            Ok(report) => report,
            Err(e) => {
                error!(
                    bot_id = bot.id,
                    deployment_id = deployment.id,
                    "Deploy aborted: {}",
                    e
                );
                self.close_aborted(deployment.id, format!("internal error: {}", e))
                    .await;
                return Err(e);
            }
        };

        let finished_at = Utc::now();
        let (bot_status, status) = if report.succeeded {
            (BotStatus::Active, DeploymentStatus::Success)
        } else {
            (BotStatus::Error, DeploymentStatus::Failed)
        };

        if let Err(e) = self
            .store
            .record_attempt(bot.id, bot_status, finished_at)
            .await
        {
            error!(
                bot_id = bot.id,
                deployment_id = deployment.id,
                "Failed to record deploy outcome: {}",
                e
            );
            let mut log = report.log();
            log.push_str(&format!("internal error: failed to record outcome: {}\n", e));
            self.close_aborted(deployment.id, log).await;
            return Err(e);
        }
        self.store
            .finish_deployment(deployment.id, status, report.log(), finished_at)
            .await?;

        if report.succeeded {
            info!(bot_id = bot.id, deployment_id = deployment.id, "Deployment succeeded");
        } else {
            warn!(
                bot_id = bot.id,
                deployment_id = deployment.id,
                timed_out = report.timed_out,
                "Deployment failed"
            );
        }

        self.store.get_deployment(deployment.id).await
    }

    /// Close a record as `failed` after an infrastructure fault. Best effort.
    async fn close_aborted(&self, deployment_id: DeploymentId, log: String) {
        let closed = self
            .store
            .finish_deployment(deployment_id, DeploymentStatus::Failed, log, Utc::now())
            .await;
        if let Err(e) = closed {
            warn!(deployment_id, "Failed to close aborted deployment: {}", e);
        }
    }

    async fn execute(&self, bot: &Bot) -> Result<ChainReport, ManagerError> {
        let deadline = Instant::now() + self.options.timeout;
        let mut report = ChainReport::new();

        let workspace = match self.workspaces.ensure(bot).await {
            Ok(workspace) => workspace,
            Err(e) => {
                report.fail(format!("failed to prepare workspace: {}", e));
                return Ok(report);
            }
        };

        let sync = workspace.sync_step(bot, self.workspaces.git_bin());
        if !execute_chain(self.runner.as_ref(), &[sync], deadline, &mut report).await? {
            return Ok(report);
        }

        let kind = ProjectKind::detect(bot, workspace.path()).await;
        debug!(bot_id = bot.id, kind = %kind, "Selected build strategy");

        let steps = select_steps(bot, &kind, workspace.path(), &self.strategy);
        execute_chain(self.runner.as_ref(), &steps, deadline, &mut report).await?;

        Ok(report)
    }

    /// Remove the bot's conventional container. Never fails; the outcome is logged.
    pub async fn remove_workload(&self, bot_id: BotId) {
        let name = service_name(bot_id);
        let step = docker::remove_step(&self.strategy.docker_bin, &name);

        match self.runner.run(&step, self.options.cleanup_timeout).await {
            Ok(outcome) if outcome.succeeded => {
                debug!(bot_id, "Removed container {}", name);
            }
            Ok(outcome) => {
                debug!(
                    bot_id,
                    "Container {} not removed: {}",
                    name,
                    outcome.combined().trim()
                );
            }
            Err(e) => {
                warn!(bot_id, "Could not run container removal for {}: {}", name, e);
            }
        }
    }

    /// Delete a bot: wait for its slot, remove its container, drop its records
    /// and its workspace
    pub async fn delete_bot(&self, bot_id: BotId) -> Result<(), ManagerError> {
        let slot = self.locks.acquire(bot_id).await;

        self.store.get_bot(bot_id).await?;
        self.remove_workload(bot_id).await;
        self.store.delete_bot(bot_id).await?;
        if let Err(e) = self.workspaces.remove(bot_id).await {
            warn!(bot_id, "Failed to remove workspace: {}", e);
        }
        info!(bot_id, "Bot deleted");

        drop(slot);
        self.locks.forget(bot_id);
        Ok(())
    }
}
