//! Record store tests

use chrono::Utc;

use bothandler::deploy::fsm::DeploymentStatus;
use bothandler::errors::ManagerError;
use bothandler::filesys::file::File;
use bothandler::models::bot::{BotStatus, NewBot};
use bothandler::store::{JsonStore, Store};
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_state_survives_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("state.json");

    {
        let store = JsonStore::open(File::new(&path)).await.unwrap();
        let bot = store
            .insert_bot(NewBot::new("echo", "https://github.com/acme/echo.git"))
            .await
            .unwrap();
        let deployment = store.insert_deployment(bot.id, Utc::now()).await.unwrap();
        store
            .finish_deployment(deployment.id, DeploymentStatus::Success, "ok\n".into(), Utc::now())
            .await
            .unwrap();
        store
            .record_attempt(bot.id, BotStatus::Active, Utc::now())
            .await
            .unwrap();
    }

    let store = JsonStore::open(File::new(&path)).await.unwrap();
    let bot = store.get_bot(1).await.unwrap();
    assert_eq!(bot.status, BotStatus::Active);
    let deployments = store.list_deployments(bot.id).await.unwrap();
    assert_eq!(deployments.len(), 1);
    assert_eq!(deployments[0].log.as_deref(), Some("ok\n"));

    // Ids keep counting from where they left off.
    let next = store
        .insert_bot(NewBot::new("two", "https://github.com/acme/two.git"))
        .await
        .unwrap();
    assert_eq!(next.id, 2);
}

#[tokio::test]
async fn test_domains_are_unique() {
    let store = JsonStore::in_memory();
    let mut first = NewBot::new("a", "https://github.com/acme/a.git");
    first.domain = Some("bot.example.com".to_string());
    store.insert_bot(first).await.unwrap();

    let mut second = NewBot::new("b", "https://github.com/acme/b.git");
    second.domain = Some("BOT.example.com".to_string());
    let err = assert_err!(store.insert_bot(second).await);
    assert!(matches!(err, ManagerError::Conflict(_)));
    assert_eq!(store.list_bots().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_cascades_to_deployments() {
    let store = JsonStore::in_memory();
    let a = store
        .insert_bot(NewBot::new("a", "https://github.com/acme/a.git"))
        .await
        .unwrap();
    let b = store
        .insert_bot(NewBot::new("b", "https://github.com/acme/b.git"))
        .await
        .unwrap();
    let gone = store.insert_deployment(a.id, Utc::now()).await.unwrap();
    let kept = store.insert_deployment(b.id, Utc::now()).await.unwrap();

    store.delete_bot(a.id).await.unwrap();

    assert!(matches!(
        store.get_deployment(gone.id).await.unwrap_err(),
        ManagerError::NotFound(_)
    ));
    assert_ok!(store.get_deployment(kept.id).await);
    assert!(matches!(
        store.list_deployments(a.id).await.unwrap_err(),
        ManagerError::NotFound(_)
    ));
    assert!(matches!(
        store.delete_bot(a.id).await.unwrap_err(),
        ManagerError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_listings_are_newest_first() {
    let store = JsonStore::in_memory();
    for name in ["a", "b", "c"] {
        store
            .insert_bot(NewBot::new(name, format!("https://github.com/acme/{}.git", name)))
            .await
            .unwrap();
    }
    let ids: Vec<u64> = store.list_bots().await.unwrap().iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![3, 2, 1]);

    let first = store.insert_deployment(1, Utc::now()).await.unwrap();
    let second = store.insert_deployment(1, Utc::now()).await.unwrap();
    let ids: Vec<u64> = store
        .list_deployments(1)
        .await
        .unwrap()
        .iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test]
async fn test_insert_deployment_requires_bot() {
    let store = JsonStore::in_memory();
    let err = assert_err!(store.insert_deployment(5, Utc::now()).await);
    assert!(matches!(err, ManagerError::NotFound(_)));
}
