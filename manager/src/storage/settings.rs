//! Settings file management

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::deploy::locks::BusyPolicy;
use crate::errors::ManagerError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Manager settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,

    /// Also write rolling log files into this directory
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Directory holding one workspace per bot
    #[serde(default = "default_workspaces_root")]
    pub workspaces_root: PathBuf,

    /// Deploy pipeline configuration
    #[serde(default)]
    pub deploy: DeploySettings,
}

fn default_true() -> bool {
    true
}

fn default_workspaces_root() -> PathBuf {
    PathBuf::from("/var/bots")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            server: ServerSettings::default(),
            workspaces_root: default_workspaces_root(),
            deploy: DeploySettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from `file`, falling back to defaults when it does not exist
    pub async fn load_or_default(file: &File) -> Result<Self, ManagerError> {
        if !file.exists().await {
            info!(
                "No settings file at {}, using defaults",
                file.path().display()
            );
            return Ok(Self::default());
        }

        file.read_json::<Settings>().await.map_err(|e| {
            ManagerError::ConfigError(format!(
                "invalid settings file {}: {}",
                file.path().display(),
                e
            ))
        })
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Address to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Deploy pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploySettings {
    /// Budget for one whole deploy (sync, build and run)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Budget for best-effort container removal
    #[serde(default = "default_cleanup_timeout_secs")]
    pub cleanup_timeout_secs: u64,

    /// Shell running custom deploy commands
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Container engine executable
    #[serde(default = "default_docker_bin")]
    pub docker_bin: String,

    /// Git executable
    #[serde(default = "default_git_bin")]
    pub git_bin: String,

    /// Behaviour when a bot is already deploying
    #[serde(default)]
    pub busy_policy: BusyPolicy,

    /// Wipe and re-clone a workspace when its repository URL or branch changed
    #[serde(default = "default_true")]
    pub reclone_on_source_change: bool,
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_cleanup_timeout_secs() -> u64 {
    30
}

fn default_shell() -> String {
    "sh".to_string()
}

fn default_docker_bin() -> String {
    "docker".to_string()
}

fn default_git_bin() -> String {
    "git".to_string()
}

impl DeploySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cleanup_timeout(&self) -> Duration {
        Duration::from_secs(self.cleanup_timeout_secs)
    }
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            cleanup_timeout_secs: default_cleanup_timeout_secs(),
            shell: default_shell(),
            docker_bin: default_docker_bin(),
            git_bin: default_git_bin(),
            busy_policy: BusyPolicy::Wait,
            reclone_on_source_change: true,
        }
    }
}
