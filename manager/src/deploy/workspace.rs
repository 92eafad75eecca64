//! Per-bot workspaces
//!
//! Every bot owns `<root>/<bot id>`, a working copy of its repository. The
//! manager inspects the directory once per deploy and turns what it finds
//! into an explicit [`WorkspaceState`] plus the git step that brings the
//! checkout up to date. Git failures are not handled here: they surface as
//! a failed step in the deploy log.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::deploy::step::Step;
use crate::errors::ManagerError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::models::bot::{Bot, BotId};
use crate::utils::sha256_hash;

/// Name of the version-control metadata directory
const GIT_DIR: &str = ".git";

/// Workspace options
#[derive(Debug, Clone)]
pub struct WorkspaceOptions {
    /// Directory holding one workspace per bot
    pub root: PathBuf,

    /// Git executable
    pub git_bin: String,

    /// Wipe and re-clone when the repository URL or branch changed
    pub reclone_on_source_change: bool,
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/var/bots"),
            git_bin: "git".to_string(),
            reclone_on_source_change: true,
        }
    }
}

/// What the workspace directory held when it was inspected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceState {
    /// No checkout yet: needs a full clone
    Uninitialized,

    /// A checkout exists: needs a pull
    CheckedOut,
}

impl fmt::Display for WorkspaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkspaceState::Uninitialized => f.write_str("uninitialized"),
            WorkspaceState::CheckedOut => f.write_str("checked_out"),
        }
    }
}

/// A prepared workspace
#[derive(Debug, Clone)]
pub struct Workspace {
    pub bot_id: BotId,
    pub dir: Dir,
    pub state: WorkspaceState,

    /// The previous checkout was discarded because the source changed
    pub recloned: bool,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The git step syncing this workspace with the bot's repository
    pub fn sync_step(&self, bot: &Bot, git_bin: &str) -> Step {
        let step = match self.state {
            WorkspaceState::Uninitialized => Step::new("clone", git_bin).args([
                "clone",
                "--branch",
                bot.github_branch.as_str(),
                "--",
                bot.github_repo_url.as_str(),
                ".",
            ]),
            WorkspaceState::CheckedOut => Step::new("pull", git_bin).args([
                "pull",
                "origin",
                bot.github_branch.as_str(),
            ]),
        };

        step.current_dir(self.path())
            .env("GIT_TERMINAL_PROMPT", "0")
    }
}

/// Fingerprint identifying the source a workspace was cloned from
pub fn source_fingerprint(repo_url: &str, branch: &str) -> String {
    sha256_hash(format!("{}\n{}", repo_url, branch).as_bytes())
}

/// Owns the workspace directories
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: Dir,
    options: WorkspaceOptions,
}

impl WorkspaceManager {
    pub fn new(options: WorkspaceOptions) -> Self {
        Self {
            root: Dir::new(options.root.clone()),
            options,
        }
    }

    pub fn git_bin(&self) -> &str {
        &self.options.git_bin
    }

    /// Directory of a bot's workspace
    pub fn dir_for(&self, bot_id: BotId) -> Dir {
        self.root.subdir(&bot_id.to_string())
    }

    fn fingerprint_file(&self, bot_id: BotId) -> File {
        self.root.file(&format!("{}.source", bot_id))
    }

    /// Make sure the bot's workspace exists and classify its state
    pub async fn ensure(&self, bot: &Bot) -> Result<Workspace, ManagerError> {
        let dir = self.dir_for(bot.id);
        dir.create().await?;

        let fingerprint = source_fingerprint(&bot.github_repo_url, &bot.github_branch);
        let marker = self.fingerprint_file(bot.id);
        let mut recloned = false;

        let mut state = if dir.contains(GIT_DIR).await {
            WorkspaceState::CheckedOut
        } else {
            WorkspaceState::Uninitialized
        };

        if state == WorkspaceState::CheckedOut {
            if marker.exists().await {
                let recorded = marker.read_string().await?;
                if recorded.trim() != fingerprint && self.options.reclone_on_source_change {
                    info!(
                        bot_id = bot.id,
                        "Repository source changed, discarding workspace {}",
                        dir.path().display()
                    );
                    dir.delete().await?;
                    dir.create().await?;
                    state = WorkspaceState::Uninitialized;
                    recloned = true;
                } else if recorded.trim() != fingerprint {
                    warn!(
                        bot_id = bot.id,
                        "Repository source changed but re-cloning is disabled; pulling into existing checkout"
                    );
                }
            } else {
                debug!(bot_id = bot.id, "Adopting existing checkout");
                marker.write_string(&fingerprint).await?;
            }
        }

        if state == WorkspaceState::Uninitialized {
            if !dir.is_empty().await? {
                debug!(bot_id = bot.id, "Clearing leftovers before clone");
                dir.delete().await?;
                dir.create().await?;
            }
            marker.write_string(&fingerprint).await?;
        }

        debug!(bot_id = bot.id, state = %state, "Workspace ready at {}", dir.path().display());

        Ok(Workspace {
            bot_id: bot.id,
            dir,
            state,
            recloned,
        })
    }

    /// Delete a bot's workspace and its source fingerprint
    pub async fn remove(&self, bot_id: BotId) -> Result<(), ManagerError> {
        self.dir_for(bot_id).delete().await?;
        self.fingerprint_file(bot_id).delete().await
    }
}
