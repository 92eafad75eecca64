//! Structured process steps
//!
//! A step is one program invocation with its own argument vector, working
//! directory and environment. Nothing is ever concatenated into a shell
//! string; only a user-provided deploy command goes through the shell, as
//! a single `-c` argument.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// One program invocation in a deploy chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Short name shown in logs (sync, build, run, ...)
    pub label: String,

    /// Program to execute
    pub program: String,

    /// Argument vector
    pub args: Vec<String>,

    /// Working directory
    pub cwd: Option<PathBuf>,

    /// Extra environment variables
    pub envs: BTreeMap<String, String>,

    /// Continue the chain even if this step fails
    pub ignore_failure: bool,

    /// Whether `program` is the shell interpreting a user command
    pub shell: bool,
}

impl Step {
    pub fn new(label: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: BTreeMap::new(),
            ignore_failure: false,
            shell: false,
        }
    }

    /// A user command interpreted by `shell -c`
    pub fn shell_command(label: impl Into<String>, shell: &str, command: &str) -> Self {
        let mut step = Self::new(label, shell).args(["-c", command]);
        step.shell = true;
        step
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.insert(key.into(), value.into());
        self
    }

    pub fn envs(mut self, envs: &BTreeMap<String, String>) -> Self {
        self.envs
            .extend(envs.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn ignore_failure(mut self) -> Self {
        self.ignore_failure = true;
        self
    }

    /// Human readable command line
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$ {}", self.command_line())
    }
}

// Display-only quoting; arguments are never passed through a shell.
fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
