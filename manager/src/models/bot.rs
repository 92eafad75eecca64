//! Bot models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::deployment::Deployment;

/// Bot identifier
pub type BotId = u64;

/// Branch used when none is configured
pub const DEFAULT_BRANCH: &str = "main";

/// Service type used when none is configured
pub const DEFAULT_SERVICE_TYPE: &str = "generic";

/// Bot lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotStatus {
    /// Registered, never deployed
    #[default]
    Inactive,

    /// Last deploy attempt succeeded
    Active,

    /// Last deploy attempt failed
    Error,
}

/// A deployable unit backed by a git repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bot {
    /// Unique bot ID
    pub id: BotId,

    /// Display name
    pub name: String,

    /// Source repository URL
    pub github_repo_url: String,

    /// Branch to check out
    pub github_branch: String,

    /// Free-form service tag (e.g. generic, telegram-bot, website)
    pub service_type: String,

    /// Optional custom deploy command, run through the shell
    pub deploy_command: Option<String>,

    /// Optional public domain, unique across bots
    pub domain: Option<String>,

    /// Environment variables handed to the workload
    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    /// Lifecycle status
    pub status: BotStatus,

    /// Time of the last deploy attempt, successful or not
    pub last_deployed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bot {
    /// Conventional container/image name of the single-container workload
    pub fn service_name(&self) -> String {
        service_name(self.id)
    }

    /// The custom deploy command, if one is set and non-blank
    pub fn custom_command(&self) -> Option<&str> {
        self.deploy_command
            .as_deref()
            .map(str::trim)
            .filter(|cmd| !cmd.is_empty())
    }

    /// The public domain, if one is set and non-blank
    pub fn public_domain(&self) -> Option<&str> {
        self.domain
            .as_deref()
            .map(str::trim)
            .filter(|domain| !domain.is_empty())
    }
}

/// Conventional container/image name for a bot id
pub fn service_name(bot_id: BotId) -> String {
    format!("service-{}", bot_id)
}

/// Fields of a bot about to be registered
#[derive(Debug, Clone, PartialEq)]
pub struct NewBot {
    pub name: String,
    pub github_repo_url: String,
    pub github_branch: String,
    pub service_type: String,
    pub deploy_command: Option<String>,
    pub domain: Option<String>,
    pub environment: BTreeMap<String, String>,
}

impl NewBot {
    pub fn new(name: impl Into<String>, github_repo_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            github_repo_url: github_repo_url.into(),
            github_branch: DEFAULT_BRANCH.to_string(),
            service_type: DEFAULT_SERVICE_TYPE.to_string(),
            deploy_command: None,
            domain: None,
            environment: BTreeMap::new(),
        }
    }
}

/// A bot together with its deployment history
#[derive(Debug, Clone, Serialize)]
pub struct BotDetails {
    #[serde(flatten)]
    pub bot: Bot,

    pub deployments: Vec<Deployment>,
}
