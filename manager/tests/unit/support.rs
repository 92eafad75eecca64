//! Shared fixtures: a scripted runner, a failing store and deployer builders

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bothandler::deploy::fsm::DeploymentStatus;
use bothandler::deploy::orchestrator::{DeployOptions, Deployer};
use bothandler::deploy::runner::{Runner, StepOutcome};
use bothandler::deploy::step::Step;
use bothandler::deploy::strategy::StrategyOptions;
use bothandler::deploy::workspace::{WorkspaceManager, WorkspaceOptions};
use bothandler::errors::ManagerError;
use bothandler::models::bot::{Bot, BotId, BotStatus, NewBot};
use bothandler::models::deployment::{Deployment, DeploymentId};
use bothandler::store::{JsonStore, Store};
use chrono::{DateTime, Utc};

/// Runner that never starts a process. Outcomes are scripted by matching
/// substrings of the rendered command line.
#[derive(Default)]
pub struct FakeRunner {
    failing: Mutex<Vec<String>>,
    hanging: Mutex<Vec<String>>,
    broken: Mutex<Vec<String>>,
    delay: Mutex<Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Steps matching `pattern` exit with status 1
    pub fn fail_on(&self, pattern: &str) {
        self.failing.lock().unwrap().push(pattern.to_string());
    }

    /// Steps matching `pattern` run until their timeout
    pub fn hang_on(&self, pattern: &str) {
        self.hanging.lock().unwrap().push(pattern.to_string());
    }

    /// Steps matching `pattern` cannot be spawned at all
    pub fn break_on(&self, pattern: &str) {
        self.broken.lock().unwrap().push(pattern.to_string());
    }

    /// Every step takes this long
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn matches(list: &Mutex<Vec<String>>, line: &str) -> bool {
        list.lock().unwrap().iter().any(|p| line.contains(p.as_str()))
    }
}

#[async_trait]
impl Runner for FakeRunner {
    async fn run(&self, step: &Step, timeout: Duration) -> Result<StepOutcome, ManagerError> {
        let line = step.command_line();
        self.calls.lock().unwrap().push(line.clone());

        if Self::matches(&self.broken, &line) {
            return Err(ManagerError::SpawnError(format!("{}: broken", step.program)));
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        let outcome = if Self::matches(&self.hanging, &line) {
            tokio::time::sleep(timeout).await;
            StepOutcome::timeout(String::new(), format!("timed out after {:?}", timeout))
        } else {
            tokio::time::sleep(delay).await;
            if Self::matches(&self.failing, &line) {
                StepOutcome::failure(1, "scripted failure")
            } else {
                StepOutcome::success(format!("ran {}", step.label))
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(outcome)
    }
}

/// In-memory store whose `record_attempt` always fails, as if the state
/// file had become unwritable mid-deploy
pub struct UnwritableBotStore {
    inner: JsonStore,
}

impl UnwritableBotStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: JsonStore::in_memory(),
        })
    }
}

#[async_trait]
impl Store for UnwritableBotStore {
    async fn insert_bot(&self, bot: NewBot) -> Result<Bot, ManagerError> {
        self.inner.insert_bot(bot).await
    }

    async fn list_bots(&self) -> Result<Vec<Bot>, ManagerError> {
        self.inner.list_bots().await
    }

    async fn get_bot(&self, id: BotId) -> Result<Bot, ManagerError> {
        self.inner.get_bot(id).await
    }

    async fn record_attempt(
        &self,
        _id: BotId,
        _status: BotStatus,
        _attempted_at: DateTime<Utc>,
    ) -> Result<Bot, ManagerError> {
        Err(ManagerError::StorageError("disk full".to_string()))
    }

    async fn delete_bot(&self, id: BotId) -> Result<(), ManagerError> {
        self.inner.delete_bot(id).await
    }

    async fn insert_deployment(
        &self,
        bot_id: BotId,
        started_at: DateTime<Utc>,
    ) -> Result<Deployment, ManagerError> {
        self.inner.insert_deployment(bot_id, started_at).await
    }

    async fn finish_deployment(
        &self,
        id: DeploymentId,
        status: DeploymentStatus,
        log: String,
        finished_at: DateTime<Utc>,
    ) -> Result<Deployment, ManagerError> {
        self.inner
            .finish_deployment(id, status, log, finished_at)
            .await
    }

    async fn get_deployment(&self, id: DeploymentId) -> Result<Deployment, ManagerError> {
        self.inner.get_deployment(id).await
    }

    async fn list_deployments(&self, bot_id: BotId) -> Result<Vec<Deployment>, ManagerError> {
        self.inner.list_deployments(bot_id).await
    }
}

/// A deployer over an in-memory store, with workspaces under `root`
pub fn deployer(
    root: &Path,
    runner: Arc<FakeRunner>,
    options: DeployOptions,
) -> (Arc<JsonStore>, Arc<Deployer>) {
    let store = Arc::new(JsonStore::in_memory());
    let deployer = deployer_over(store.clone(), root, runner, options);
    (store, deployer)
}

/// A deployer over the given store, with workspaces under `root`
pub fn deployer_over(
    store: Arc<dyn Store>,
    root: &Path,
    runner: Arc<FakeRunner>,
    options: DeployOptions,
) -> Arc<Deployer> {
    Arc::new(Deployer::new(
        store,
        runner,
        WorkspaceManager::new(WorkspaceOptions {
            root: root.to_path_buf(),
            ..Default::default()
        }),
        StrategyOptions::default(),
        options,
    ))
}
