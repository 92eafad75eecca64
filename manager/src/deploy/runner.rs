//! Process runner
//!
//! Executes deploy steps with a hard wall-clock timeout and captures their
//! output. A non-zero exit or a timeout is an ordinary, recorded failure;
//! only being unable to start the shell (or another spawn-level IO fault)
//! is an error.

use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::deploy::step::Step;
use crate::errors::ManagerError;

/// Default budget for a whole deploy chain
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Longest wait for output pipes to close once the process has exited
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Exit code a shell reports for an unknown command
const EXIT_NOT_FOUND: i32 = 127;

/// Result of running one step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutcome {
    pub succeeded: bool,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub stdout: String,
    pub stderr: String,
}

impl StepOutcome {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            exit_code: Some(0),
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            exit_code: Some(exit_code),
            stderr: stderr.into(),
            ..Default::default()
        }
    }

    pub fn timeout(stdout: String, stderr: String) -> Self {
        Self {
            succeeded: false,
            exit_code: None,
            timed_out: true,
            stdout,
            stderr,
        }
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out
    }
}

/// Executes a single step
#[async_trait]
pub trait Runner: Send + Sync {
    /// Run the step, killing it once `timeout` has elapsed
    async fn run(&self, step: &Step, timeout: Duration) -> Result<StepOutcome, ManagerError>;
}

/// Runner backed by real child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Runner for ProcessRunner {
    async fn run(&self, step: &Step, timeout: Duration) -> Result<StepOutcome, ManagerError> {
        debug!("Running step [{}]: {}", step.label, step.command_line());

        let mut cmd = Command::new(&step.program);
        cmd.args(&step.args)
            .envs(&step.envs)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = &step.cwd {
            let is_dir = tokio::fs::metadata(cwd)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if !is_dir {
                return Ok(StepOutcome::failure(
                    2,
                    format!("cd: {}: No such file or directory", cwd.display()),
                ));
            }
            cmd.current_dir(cwd);
        }

        let started = Instant::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !step.shell => {
                return Ok(StepOutcome::failure(
                    EXIT_NOT_FOUND,
                    format!("{}: command not found", step.program),
                ));
            }
            Err(e) => {
                return Err(ManagerError::SpawnError(format!(
                    "{}: {}",
                    step.program, e
                )));
            }
        };

        let stdout = Drain::spawn(child.stdout.take());
        let stderr = Drain::spawn(child.stderr.take());

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                // Background processes may still hold the pipes after a clean exit.
                let grace = timeout.saturating_sub(started.elapsed()).min(DRAIN_GRACE);
                let stdout = stdout.collect(&step.label, grace).await;
                let stderr = stderr.collect(&step.label, grace).await;
                Ok(StepOutcome {
                    succeeded: status.success(),
                    exit_code: status.code(),
                    timed_out: false,
                    stdout,
                    stderr,
                })
            }
            Ok(Err(e)) => Err(ManagerError::SpawnError(format!(
                "failed waiting for {}: {}",
                step.program, e
            ))),
            Err(_) => {
                warn!(
                    "Step [{}] timed out after {:?}, killing process",
                    step.label, timeout
                );
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out process: {}", e);
                }
                let stdout = stdout.collect(&step.label, DRAIN_GRACE).await;
                let mut stderr = stderr.collect(&step.label, DRAIN_GRACE).await;
                if !stderr.is_empty() && !stderr.ends_with('\n') {
                    stderr.push('\n');
                }
                stderr.push_str(&format!("timed out after {}s", timeout.as_secs()));
                Ok(StepOutcome::timeout(stdout, stderr))
            }
        }
    }
}

/// Reads one output pipe into a shared buffer so a partial read survives an abort
struct Drain {
    buf: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl Drain {
    fn spawn<R>(reader: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = buf.clone();
        let task = tokio::spawn(async move {
            let Some(mut reader) = reader else {
                return;
            };
            let mut chunk = [0u8; 8192];
            loop {
                match reader.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => sink
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&chunk[..n]),
                }
            }
        });
        Self { buf, task }
    }

    /// Wait up to `grace` for EOF, then give up and keep what was read so far
    async fn collect(self, label: &str, grace: Duration) -> String {
        let abort = self.task.abort_handle();
        if tokio::time::timeout(grace, self.task).await.is_err() {
            abort.abort();
            debug!("Step [{}] left its output pipe open, output truncated", label);
        }
        let bytes = std::mem::take(&mut *self.buf.lock().unwrap_or_else(PoisonError::into_inner));
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

// ============================== CHAINS ================================= //

/// A step together with how it went
#[derive(Debug, Clone)]
pub struct StepReport {
    pub step: Step,
    pub outcome: StepOutcome,
}

/// Aggregated result of an ordered chain of steps
#[derive(Debug, Clone)]
pub struct ChainReport {
    pub steps: Vec<StepReport>,
    pub succeeded: bool,
    pub timed_out: bool,
    notes: Vec<String>,
}

impl Default for ChainReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainReport {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            succeeded: true,
            timed_out: false,
            notes: Vec::new(),
        }
    }

    /// Record a step outcome. Fails the chain unless the step is ignorable.
    pub fn push(&mut self, step: Step, outcome: StepOutcome) {
        if !outcome.succeeded && !step.ignore_failure {
            self.succeeded = false;
        }
        self.timed_out |= outcome.timed_out;
        self.steps.push(StepReport { step, outcome });
    }

    /// Fail the chain with a message that did not come from a process
    pub fn fail(&mut self, message: impl Into<String>) {
        self.succeeded = false;
        self.notes.push(message.into());
    }

    /// Combined log: per step the command line, its stdout, then its stderr
    pub fn log(&self) -> String {
        let mut log = String::new();
        for report in &self.steps {
            log.push_str(&report.step.to_string());
            log.push('\n');

            let output = report.outcome.combined();
            if !output.is_empty() {
                log.push_str(&output);
                if !output.ends_with('\n') {
                    log.push('\n');
                }
            }

            if !report.outcome.succeeded && !report.outcome.timed_out {
                match report.outcome.exit_code {
                    Some(code) => log.push_str(&format!("[exit code {}]", code)),
                    None => log.push_str("[terminated by signal]"),
                }
                if report.step.ignore_failure {
                    log.push_str(" (ignored)");
                }
                log.push('\n');
            }
        }
        for note in &self.notes {
            log.push_str(note);
            log.push('\n');
        }
        log
    }
}

/// Run steps in order against a shared deadline.
///
/// Stops at the first failing step that is not marked `ignore_failure`.
/// Returns whether the chain is still healthy.
pub async fn execute_chain(
    runner: &dyn Runner,
    steps: &[Step],
    deadline: Instant,
    report: &mut ChainReport,
) -> Result<bool, ManagerError> {
    for step in steps {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let outcome = if remaining.is_zero() {
            StepOutcome::timeout(String::new(), "deploy timeout exceeded before step started".to_string())
        } else {
            runner.run(step, remaining).await?
        };

        let stop = !outcome.succeeded && (!step.ignore_failure || outcome.timed_out);
        report.push(step.clone(), outcome);
        if stop {
            // A timed out ignorable step still exhausted the shared budget.
            report.succeeded = false;
            return Ok(false);
        }
    }
    Ok(report.succeeded)
}
