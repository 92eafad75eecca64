//! Process runner tests against real processes

use std::time::{Duration, Instant};

use bothandler::deploy::runner::{execute_chain, ChainReport, ProcessRunner, Runner};
use bothandler::deploy::step::Step;
use bothandler::errors::ManagerError;
use tokio_test::{assert_err, assert_ok};

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn test_captures_stdout_and_stderr() {
    let step = Step::shell_command("deploy", "sh", "echo hello; echo oops 1>&2");
    let outcome = assert_ok!(ProcessRunner::new().run(&step, TIMEOUT).await);
    assert!(outcome.succeeded);
    assert_eq!(outcome.exit_code, Some(0));
    assert_eq!(outcome.stdout, "hello\n");
    assert_eq!(outcome.stderr, "oops\n");
}

#[tokio::test]
async fn test_non_zero_exit_is_failure() {
    let step = Step::shell_command("deploy", "sh", "exit 3");
    let outcome = ProcessRunner::new().run(&step, TIMEOUT).await.unwrap();
    assert!(!outcome.succeeded);
    assert!(!outcome.timed_out);
    assert_eq!(outcome.exit_code, Some(3));
}

#[tokio::test]
async fn test_environment_and_cwd() {
    let tmp = tempfile::tempdir().unwrap();
    let step = Step::shell_command("deploy", "sh", "echo $GREETING; pwd")
        .current_dir(tmp.path())
        .env("GREETING", "hi");
    let outcome = ProcessRunner::new().run(&step, TIMEOUT).await.unwrap();
    assert!(outcome.succeeded);

    let lines: Vec<&str> = outcome.stdout.lines().collect();
    assert_eq!(lines[0], "hi");
    let reported = std::fs::canonicalize(lines[1]).unwrap();
    assert_eq!(reported, std::fs::canonicalize(tmp.path()).unwrap());
}

#[tokio::test]
async fn test_timeout_kills_the_process() {
    let step = Step::new("sleep", "sleep").arg("5");
    let started = Instant::now();
    let outcome = ProcessRunner::new()
        .run(&step, Duration::from_millis(200))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(!outcome.succeeded);
    assert!(outcome.timed_out);
    assert!(outcome.stderr.contains("timed out"));
}

#[tokio::test]
async fn test_background_process_does_not_outlive_the_timeout() {
    // The backgrounded sleep inherits both pipes and keeps them open.
    let step = Step::shell_command("deploy", "sh", "sleep 8 & echo started");
    let started = Instant::now();
    let outcome = assert_ok!(ProcessRunner::new().run(&step, Duration::from_secs(1)).await);

    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(outcome.succeeded);
    assert!(!outcome.timed_out);
    assert_eq!(outcome.stdout, "started\n");
}

#[tokio::test]
async fn test_missing_program_is_a_recorded_failure() {
    let step = Step::new("build", "definitely-not-a-real-binary-4242");
    let outcome = ProcessRunner::new().run(&step, TIMEOUT).await.unwrap();
    assert!(!outcome.succeeded);
    assert_eq!(outcome.exit_code, Some(127));
    assert!(outcome.stderr.contains("command not found"));
}

#[tokio::test]
async fn test_missing_cwd_is_a_recorded_failure() {
    let step = Step::new("build", "true").current_dir("/nonexistent/bothandler/ws");
    let outcome = ProcessRunner::new().run(&step, TIMEOUT).await.unwrap();
    assert!(!outcome.succeeded);
    assert_eq!(outcome.exit_code, Some(2));
}

#[tokio::test]
async fn test_missing_shell_is_an_error() {
    let step = Step::shell_command("deploy", "/nonexistent/bin/sh", "true");
    let err = assert_err!(ProcessRunner::new().run(&step, TIMEOUT).await);
    assert!(matches!(err, ManagerError::SpawnError(_)));
}

#[tokio::test]
async fn test_chain_stops_at_first_failure() {
    let steps = vec![
        Step::shell_command("one", "sh", "echo one"),
        Step::shell_command("two", "sh", "exit 1").ignore_failure(),
        Step::shell_command("three", "sh", "echo three; exit 4"),
        Step::shell_command("four", "sh", "echo four"),
    ];
    let mut report = ChainReport::new();
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    let healthy = execute_chain(&ProcessRunner::new(), &steps, deadline, &mut report)
        .await
        .unwrap();

    assert!(!healthy);
    assert!(!report.succeeded);
    assert_eq!(report.steps.len(), 3);

    let log = report.log();
    assert!(log.contains("$ sh -c 'echo one'\none\n"));
    assert!(log.contains("[exit code 1] (ignored)"));
    assert!(log.contains("three\n[exit code 4]"));
    assert!(!log.contains("four"));
}

#[tokio::test]
async fn test_chain_shares_one_deadline() {
    let steps = vec![
        Step::new("first", "sleep").arg("0.3"),
        Step::new("second", "sleep").arg("5"),
    ];
    let mut report = ChainReport::new();
    let deadline = tokio::time::Instant::now() + Duration::from_millis(600);
    let started = Instant::now();
    let healthy = execute_chain(&ProcessRunner::new(), &steps, deadline, &mut report)
        .await
        .unwrap();

    assert!(!healthy);
    assert!(report.timed_out);
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(report.steps[0].outcome.succeeded);
    assert!(report.steps[1].outcome.timed_out);
}
