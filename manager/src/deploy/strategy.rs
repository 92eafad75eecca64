//! Build strategy selection
//!
//! Decides how a synced workspace becomes a running workload. First match
//! wins: a custom deploy command, then a compose manifest, then the
//! single-container fallback.

use std::fmt;
use std::path::Path;

use crate::deploy::step::Step;
use crate::deploy::{compose, docker};
use crate::models::bot::Bot;

/// Strategy options
#[derive(Debug, Clone)]
pub struct StrategyOptions {
    /// Container runtime CLI
    pub docker_bin: String,

    /// Shell interpreting custom deploy commands
    pub shell: String,
}

impl Default for StrategyOptions {
    fn default() -> Self {
        Self {
            docker_bin: "docker".to_string(),
            shell: "sh".to_string(),
        }
    }
}

/// How a bot is materialized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectKind {
    /// The bot's own deploy command
    Custom(String),

    /// Multi-container compose project
    Compose,

    /// One image, one container
    Fallback,
}

impl ProjectKind {
    /// Classify a bot against its synced workspace
    pub async fn detect(bot: &Bot, workspace: &Path) -> Self {
        if let Some(command) = bot.custom_command() {
            ProjectKind::Custom(command.to_string())
        } else if compose::has_manifest(workspace).await {
            ProjectKind::Compose
        } else {
            ProjectKind::Fallback
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectKind::Custom(_) => "custom",
            ProjectKind::Compose => "compose",
            ProjectKind::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ProjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered steps materializing `bot` for the given kind
pub fn select_steps(
    bot: &Bot,
    kind: &ProjectKind,
    workspace: &Path,
    options: &StrategyOptions,
) -> Vec<Step> {
    match kind {
        ProjectKind::Custom(command) => vec![Step::shell_command(
            "deploy",
            &options.shell,
            command,
        )
        .current_dir(workspace)
        .envs(&bot.environment)],
        ProjectKind::Compose => vec![compose::up_step(
            &options.docker_bin,
            workspace,
            &bot.environment,
        )],
        ProjectKind::Fallback => {
            let name = bot.service_name();
            vec![
                docker::build_step(&options.docker_bin, &name, workspace),
                docker::remove_step(&options.docker_bin, &name),
                docker::run_step(&options.docker_bin, bot, workspace),
            ]
        }
    }
}

/// Detect the project kind and return its steps
pub async fn select_commands(bot: &Bot, workspace: &Path, options: &StrategyOptions) -> Vec<Step> {
    let kind = ProjectKind::detect(bot, workspace).await;
    select_steps(bot, &kind, workspace, options)
}
