//! Build strategy selection tests

use std::collections::BTreeMap;

use bothandler::deploy::strategy::{select_commands, select_steps, ProjectKind, StrategyOptions};
use bothandler::models::bot::{Bot, BotStatus};
use chrono::Utc;

fn bot(id: u64) -> Bot {
    Bot {
        id,
        name: format!("bot-{}", id),
        github_repo_url: "https://github.com/acme/bot.git".to_string(),
        github_branch: "main".to_string(),
        service_type: "generic".to_string(),
        deploy_command: None,
        domain: None,
        environment: BTreeMap::new(),
        status: BotStatus::Inactive,
        last_deployed_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_custom_command_wins_over_compose() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("docker-compose.yml"), "services: {}\n").unwrap();

    let mut bot = bot(1);
    bot.deploy_command = Some("make deploy".to_string());
    bot.environment.insert("TOKEN".to_string(), "abc".to_string());

    let kind = ProjectKind::detect(&bot, tmp.path()).await;
    assert_eq!(kind, ProjectKind::Custom("make deploy".to_string()));

    let steps = select_steps(&bot, &kind, tmp.path(), &StrategyOptions::default());
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].command_line(), "sh -c 'make deploy'");
    assert!(steps[0].shell);
    assert_eq!(steps[0].cwd.as_deref(), Some(tmp.path()));
    assert_eq!(steps[0].envs.get("TOKEN").map(String::as_str), Some("abc"));
}

#[tokio::test]
async fn test_blank_command_is_ignored() {
    let tmp = tempfile::tempdir().unwrap();
    let mut bot = bot(2);
    bot.deploy_command = Some("   ".to_string());
    assert_eq!(ProjectKind::detect(&bot, tmp.path()).await, ProjectKind::Fallback);
}

#[tokio::test]
async fn test_compose_manifest_selects_compose() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("docker-compose.yaml"), "services: {}\n").unwrap();

    let steps = select_commands(&bot(3), tmp.path(), &StrategyOptions::default()).await;
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].command_line(), "docker compose up -d --build");
    assert_eq!(steps[0].cwd.as_deref(), Some(tmp.path()));
}

#[tokio::test]
async fn test_fallback_without_domain() {
    let tmp = tempfile::tempdir().unwrap();
    let steps = select_commands(&bot(42), tmp.path(), &StrategyOptions::default()).await;

    let lines: Vec<String> = steps.iter().map(|s| s.command_line()).collect();
    assert_eq!(
        lines,
        vec![
            "docker build -t service-42 .".to_string(),
            "docker rm -f service-42".to_string(),
            "docker run -d --name service-42 --label com.bothandler.bot_id=42 \
             --label com.bothandler.service_type=generic service-42"
                .to_string(),
        ]
    );
    assert!(steps[1].ignore_failure);
    assert!(!steps[0].ignore_failure && !steps[2].ignore_failure);
    assert!(!lines[2].contains("VIRTUAL_HOST"));
}

#[tokio::test]
async fn test_fallback_with_domain_and_environment() {
    let tmp = tempfile::tempdir().unwrap();
    let mut bot = bot(7);
    bot.domain = Some("bot.example.com".to_string());
    bot.environment.insert("B".to_string(), "2".to_string());
    bot.environment.insert("A".to_string(), "1".to_string());

    let steps = select_commands(&bot, tmp.path(), &StrategyOptions::default()).await;
    assert_eq!(
        steps[2].args,
        vec![
            "run",
            "-d",
            "--name",
            "service-7",
            "--label",
            "com.bothandler.bot_id=7",
            "--label",
            "com.bothandler.service_type=generic",
            "-e",
            "VIRTUAL_HOST=bot.example.com",
            "-e",
            "LETSENCRYPT_HOST=bot.example.com",
            "-e",
            "A=1",
            "-e",
            "B=2",
            "service-7",
        ]
    );
}

#[tokio::test]
async fn test_routing_variables_come_only_from_domain() {
    let tmp = tempfile::tempdir().unwrap();
    let mut bot = bot(9);
    bot.environment
        .insert("VIRTUAL_HOST".to_string(), "spoof.example.com".to_string());
    bot.environment
        .insert("LETSENCRYPT_HOST".to_string(), "spoof.example.com".to_string());
    bot.environment.insert("TOKEN".to_string(), "abc".to_string());

    let steps = select_commands(&bot, tmp.path(), &StrategyOptions::default()).await;
    let run = steps[2].command_line();
    assert!(!run.contains("VIRTUAL_HOST"));
    assert!(!run.contains("LETSENCRYPT_HOST"));
    assert!(run.contains("-e TOKEN=abc"));

    bot.domain = Some("bot.example.com".to_string());
    let steps = select_commands(&bot, tmp.path(), &StrategyOptions::default()).await;
    let run = steps[2].command_line();
    assert!(run.contains("-e VIRTUAL_HOST=bot.example.com"));
    assert!(!run.contains("spoof"));
}

#[tokio::test]
async fn test_selection_is_stable() {
    let tmp = tempfile::tempdir().unwrap();
    let options = StrategyOptions {
        docker_bin: "podman".to_string(),
        shell: "bash".to_string(),
    };
    let first = select_commands(&bot(9), tmp.path(), &options).await;
    let second = select_commands(&bot(9), tmp.path(), &options).await;
    assert_eq!(first, second);
    assert_eq!(first[0].program, "podman");
}
