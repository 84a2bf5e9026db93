// Integration tests for conversation persistence and the fallback chain

use anyhow::Result;
use chrono::{Duration, Utc};
use mockito::{Matcher, Server};
use std::sync::Arc;
use tempfile::TempDir;

use banter::discussion::Message;
use banter::storage::{
    ConversationDraft, ConversationStore, FallbackStore, LocalStore, RemoteStore,
};

fn draft(id: Option<&str>, topic: &str) -> ConversationDraft {
    ConversationDraft {
        id: id.map(str::to_string),
        topic: topic.to_string(),
        messages: vec![
            Message::topic_seed("You", topic),
            Message::user("You", "go on"),
        ],
        roster_ids: vec!["claude".to_string(), "grok".to_string()],
    }
}

#[tokio::test]
async fn test_resave_keeps_list_size_and_new_topic_grows_it() -> Result<()> {
    let dir = TempDir::new()?;
    let store = FallbackStore::new(vec![Arc::new(LocalStore::in_dir(dir.path()))]);

    let id = store.save(&draft(None, "tides")).await?;
    assert_eq!(store.list().await?.len(), 1);

    let mut longer = draft(Some(&id), "tides");
    longer.messages.push(Message::user("You", "and the moon?"));
    assert_eq!(store.save(&longer).await?, id);
    let all = store.list().await?;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].messages.len(), 3);

    store.save(&draft(None, "tea")).await?;
    assert_eq!(store.list().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_save_falls_back_when_remote_fails() -> Result<()> {
    let mut server = Server::new_async().await;
    let remote_mock = server
        .mock("POST", "/rest/v1/ai_conversations")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;

    let dir = TempDir::new()?;
    let local = Arc::new(LocalStore::in_dir(dir.path()));
    let remote = Arc::new(RemoteStore::new(
        &format!("{}/rest/v1", server.url()),
        "anon",
        None,
    ));
    let store = FallbackStore::new(vec![remote, local.clone()]);

    let id = store.save(&draft(None, "tides")).await?;
    remote_mock.assert_async().await;

    let saved = local.load(&id).await?.expect("saved locally");
    assert_eq!(saved.topic, "tides");
    Ok(())
}

#[tokio::test]
async fn test_list_merges_and_dedups_newest_first() -> Result<()> {
    let mut server = Server::new_async().await;
    let newer = (Utc::now() + Duration::hours(1)).to_rfc3339();
    let body = format!(
        r#"[
            {{"id":"shared","topic":"remote copy","messages":[],"selected_models":["claude","grok"],"created_at":"{newer}"}},
            {{"id":"remote-only","topic":"old","messages":[],"selected_models":["claude","grok"],"created_at":"2020-01-01T00:00:00Z"}}
        ]"#,
        newer = newer
    );
    server
        .mock("GET", "/rest/v1/ai_conversations")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let dir = TempDir::new()?;
    let local = Arc::new(LocalStore::in_dir(dir.path()));
    local.save(&draft(Some("shared"), "local copy")).await?;
    local.save(&draft(Some("local-only"), "fresh")).await?;

    let remote = Arc::new(RemoteStore::new(
        &format!("{}/rest/v1", server.url()),
        "anon",
        None,
    ));
    let store = FallbackStore::new(vec![remote, local]);

    let all = store.list().await?;
    let ids: Vec<_> = all.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["shared", "local-only", "remote-only"]);
    assert_eq!(all[0].topic, "remote copy");
    Ok(())
}

#[tokio::test]
async fn test_list_survives_unreachable_remote() -> Result<()> {
    let dir = TempDir::new()?;
    let local = Arc::new(LocalStore::in_dir(dir.path()));
    local.save(&draft(None, "tides")).await?;

    // Nothing listens on port 9
    let remote = Arc::new(RemoteStore::new("http://127.0.0.1:9/rest/v1", "anon", None));
    let store = FallbackStore::new(vec![remote, local]);

    assert_eq!(store.list().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_delete_reaches_every_backend() -> Result<()> {
    let first_dir = TempDir::new()?;
    let second_dir = TempDir::new()?;
    let first = Arc::new(LocalStore::in_dir(first_dir.path()));
    let second = Arc::new(LocalStore::in_dir(second_dir.path()));
    first.save(&draft(Some("c1"), "tides")).await?;
    second.save(&draft(Some("c1"), "tides")).await?;

    let store = FallbackStore::new(vec![first.clone(), second.clone()]);
    assert!(store.delete("c1").await?);
    assert!(first.load("c1").await?.is_none());
    assert!(second.load("c1").await?.is_none());
    assert!(!store.delete("c1").await?);
    Ok(())
}
