//! Bot registry
//!
//! Registration, listing and deletion of bot definitions. Deletion goes
//! through the deployer so it waits for an in-flight deploy and removes the
//! bot's container first.

use std::sync::Arc;

use api_models::models::CreateBotRequest;
use tracing::info;

use crate::deploy::docker::RESERVED_ENV;
use crate::deploy::orchestrator::Deployer;
use crate::errors::ManagerError;
use crate::models::bot::{Bot, BotDetails, BotId, NewBot, DEFAULT_BRANCH, DEFAULT_SERVICE_TYPE};

/// Longest accepted value for short text fields
pub const MAX_FIELD_LEN: usize = 255;

/// Bot registry
pub struct Registry {
    deployer: Arc<Deployer>,
}

impl Registry {
    pub fn new(deployer: Arc<Deployer>) -> Self {
        Self { deployer }
    }

    /// Validate and register a bot
    pub async fn create(&self, request: CreateBotRequest) -> Result<Bot, ManagerError> {
        let new_bot = validate(request)?;
        let bot = self.deployer.store().insert_bot(new_bot).await?;
        info!(bot_id = bot.id, "Registered bot {}", bot.name);
        Ok(bot)
    }

    /// All bots, newest first
    pub async fn list(&self) -> Result<Vec<Bot>, ManagerError> {
        self.deployer.store().list_bots().await
    }

    /// A bot with its deployment history
    pub async fn show(&self, id: BotId) -> Result<BotDetails, ManagerError> {
        let store = self.deployer.store();
        let bot = store.get_bot(id).await?;
        let deployments = store.list_deployments(id).await?;
        Ok(BotDetails { bot, deployments })
    }

    pub async fn delete(&self, id: BotId) -> Result<(), ManagerError> {
        self.deployer.delete_bot(id).await
    }

    pub async fn delete_all(&self) -> Result<usize, ManagerError> {
        self.deployer.delete_all().await
    }
}

/// Turn a registration request into a bot definition
pub fn validate(request: CreateBotRequest) -> Result<NewBot, ManagerError> {
    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(ManagerError::ValidationError("name is required".to_string()));
    }
    check_len("name", &name)?;

    let github_repo_url = request.github_repo_url.trim().to_string();
    if github_repo_url.is_empty() {
        return Err(ManagerError::ValidationError(
            "github_repo_url is required".to_string(),
        ));
    }
    url::Url::parse(&github_repo_url).map_err(|e| {
        ManagerError::ValidationError(format!("github_repo_url is not a valid URL: {}", e))
    })?;

    let github_branch = non_blank(request.github_branch).unwrap_or_else(|| DEFAULT_BRANCH.to_string());
    check_len("github_branch", &github_branch)?;
    if github_branch.starts_with('-') || github_branch.chars().any(char::is_whitespace) {
        return Err(ManagerError::ValidationError(format!(
            "github_branch {:?} is not a valid branch name",
            github_branch
        )));
    }

    let service_type =
        non_blank(request.service_type).unwrap_or_else(|| DEFAULT_SERVICE_TYPE.to_string());
    check_len("service_type", &service_type)?;

    let domain = non_blank(request.domain);
    if let Some(domain) = &domain {
        check_len("domain", domain)?;
        if domain.chars().any(char::is_whitespace) {
            return Err(ManagerError::ValidationError(
                "domain must not contain whitespace".to_string(),
            ));
        }
    }

    let environment = request.environment.unwrap_or_default();
    if let Some(key) = environment
        .keys()
        .find(|key| key.is_empty() || key.contains('='))
    {
        return Err(ManagerError::ValidationError(format!(
            "environment variable name {:?} is invalid",
            key
        )));
    }
    if let Some(key) = environment
        .keys()
        .find(|key| RESERVED_ENV.contains(&key.as_str()))
    {
        return Err(ManagerError::ValidationError(format!(
            "environment variable {} is derived from domain",
            key
        )));
    }

    Ok(NewBot {
        name,
        github_repo_url,
        github_branch,
        service_type,
        deploy_command: non_blank(request.deploy_command),
        domain,
        environment,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_len(field: &str, value: &str) -> Result<(), ManagerError> {
    if value.chars().count() > MAX_FIELD_LEN {
        return Err(ManagerError::ValidationError(format!(
            "{} must be at most {} characters",
            field, MAX_FIELD_LEN
        )));
    }
    Ok(())
}
