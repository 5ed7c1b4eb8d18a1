// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that run the real `ballot` binary against an
//! in-process mock backend.

use std::sync::atomic::Ordering;

use ballot::storage::{FileStorage, StorageBackend};
use ballot::test_support::{access_token, MockBackend};
use ballot_specs::Ballot;

async fn signed_up(backend: &MockBackend) -> anyhow::Result<Ballot> {
    let ballot = Ballot::persistent(&backend.base_url())?;
    let out = ballot
        .run(&["signup", "--email", "ada@example.com", "--username", "ada", "--password", "pw"])
        .await?
        .json()?;
    assert_eq!(out["username"], "ada");
    assert!(out.get("access_token").is_none());
    Ok(ballot)
}

// -- Session ------------------------------------------------------------------

#[tokio::test]
async fn signup_session_survives_restart() -> anyhow::Result<()> {
    let backend = MockBackend::spawn().await?;
    let ballot = signed_up(&backend).await?;

    let state_file = ballot.state_dir().map(|d| d.join(ballot::storage::STORAGE_FILE));
    assert!(state_file.is_some_and(|f| f.exists()));

    let run = ballot.run(&["whoami"]).await?;
    assert!(!run.stdout.contains("access_token"), "stdout: {}", run.stdout);
    let whoami = run.json()?;
    assert_eq!(whoami["state"], "authenticated");
    assert_eq!(whoami["session"]["username"], "ada");
    assert_eq!(whoami["session"]["email"], "ada@example.com");
    assert_eq!(backend.state.refresh_calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn ephemeral_session_is_not_kept() -> anyhow::Result<()> {
    let backend = MockBackend::spawn().await?;
    backend.state.add_user("ada@example.com", "ada", "pw");
    let ballot = Ballot::ephemeral(&backend.base_url());

    ballot.run(&["login", "--email", "ada@example.com", "--password", "pw"]).await?.json()?;
    let whoami = ballot.run(&["whoami"]).await?.json()?;
    assert_eq!(whoami["state"], "unauthenticated");
    Ok(())
}

#[tokio::test]
async fn wrong_password_fails() -> anyhow::Result<()> {
    let backend = MockBackend::spawn().await?;
    backend.state.add_user("ada@example.com", "ada", "pw");
    let ballot = Ballot::ephemeral(&backend.base_url());

    let run = ballot.run(&["login", "--email", "ada@example.com", "--password", "nope"]).await?;
    assert!(!run.status.success());
    assert!(run.stderr.contains("invalid credentials"), "stderr: {}", run.stderr);
    Ok(())
}

#[tokio::test]
async fn expired_session_is_refreshed_on_start() -> anyhow::Result<()> {
    let backend = MockBackend::spawn().await?;
    let user = backend.state.add_user("ada@example.com", "ada", "pw");
    backend.state.accept_refresh("R", &user.id);
    let ballot = Ballot::persistent(&backend.base_url())?;
    let dir = ballot.state_dir().ok_or_else(|| anyhow::anyhow!("no state dir"))?;
    let expired = access_token(&user.id, "ada@example.com", "ada", -60);
    FileStorage::in_dir(dir).set_all(&[("access_token", expired.as_str()), ("refresh_token", "R")]);

    let whoami = ballot.run(&["whoami"]).await?.json()?;

    assert_eq!(whoami["state"], "authenticated");
    assert_eq!(backend.state.refresh_calls.load(Ordering::SeqCst), 1);
    let stored = FileStorage::in_dir(dir).get("refresh_token");
    assert!(stored.is_some_and(|r| r != "R"));
    Ok(())
}

#[tokio::test]
async fn revoked_session_asks_for_login() -> anyhow::Result<()> {
    let backend = MockBackend::spawn().await?;
    let ballot = Ballot::persistent(&backend.base_url())?;
    let dir = ballot.state_dir().ok_or_else(|| anyhow::anyhow!("no state dir"))?;
    let expired = access_token("user-1", "ada@example.com", "ada", -60);
    FileStorage::in_dir(dir).set_all(&[("access_token", expired.as_str()), ("refresh_token", "gone")]);

    let run = ballot.run(&["polls", "create", "--title", "Lunch", "--option", "A", "--option", "B"]).await?;

    assert!(!run.status.success());
    assert!(run.stderr.contains("ballot login"), "stderr: {}", run.stderr);
    assert_eq!(FileStorage::in_dir(dir).get("access_token"), None);
    Ok(())
}

#[tokio::test]
async fn logout_revokes_and_forgets() -> anyhow::Result<()> {
    let backend = MockBackend::spawn().await?;
    let ballot = signed_up(&backend).await?;

    let out = ballot.run(&["logout"]).await?.json()?;
    assert_eq!(out["state"], "unauthenticated");
    assert_eq!(backend.state.logout_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.state.refresh_token_count(), 0);

    let whoami = ballot.run(&["whoami"]).await?.json()?;
    assert_eq!(whoami["state"], "unauthenticated");
    Ok(())
}

// -- Polls and votes ----------------------------------------------------------

#[tokio::test]
async fn poll_lifecycle() -> anyhow::Result<()> {
    let backend = MockBackend::spawn().await?;
    let ballot = signed_up(&backend).await?;

    let poll = ballot
        .run(&[
            "polls", "create", "--title", "Lunch", "--description", "Friday", "--option", "Thai food",
            "--option", "Pizza",
        ])
        .await?
        .json()?;
    let id = poll["id"].as_str().ok_or_else(|| anyhow::anyhow!("no poll id"))?.to_owned();
    assert_eq!(poll["title"], "Lunch");
    assert_eq!(poll["options"], serde_json::json!(["Thai food", "Pizza"]));

    let list = ballot.run(&["polls", "list"]).await?.json()?;
    assert_eq!(list.as_array().map(Vec::len), Some(1));

    let vote = ballot.run(&["vote", &id, "Thai food"]).await?.json()?;
    assert_eq!(vote["option"], "Thai food");

    let counts = ballot.run(&["votes", "counts", &id]).await?.json()?;
    assert_eq!(counts["counts"]["Thai food"], 1);
    assert_eq!(counts["counts"]["Pizza"], 0);

    let voters = ballot.run(&["votes", "voters", &id, "Thai food"]).await?.json()?;
    assert_eq!(voters["voters"][0]["username"], "ada");

    let shown = ballot.run(&["polls", "show", &id]).await?.json()?;
    assert_eq!(shown["vote_counts"]["Thai food"], 1);

    ballot.run(&["unvote", &id]).await?.json()?;
    assert_eq!(backend.state.vote_count(&id), 0);

    let updated = ballot.run(&["polls", "update", &id, "--title", "Dinner"]).await?.json()?;
    assert_eq!(updated["title"], "Dinner");

    let deleted = ballot.run(&["polls", "delete", &id]).await?.json()?;
    assert_eq!(deleted["deleted"], id.as_str());
    assert!(backend.state.poll(&id).is_none());
    Ok(())
}

#[tokio::test]
async fn single_option_poll_is_rejected_locally() -> anyhow::Result<()> {
    let backend = MockBackend::spawn().await?;
    let ballot = signed_up(&backend).await?;
    let before = backend.state.authed_calls.load(Ordering::SeqCst);

    let run = ballot.run(&["polls", "create", "--title", "Lunch", "--option", "A"]).await?;

    assert!(!run.status.success());
    assert!(run.stderr.contains("Please provide at least 2 options"), "stderr: {}", run.stderr);
    assert_eq!(backend.state.authed_calls.load(Ordering::SeqCst), before);
    Ok(())
}

#[tokio::test]
async fn missing_poll_reports_not_found() -> anyhow::Result<()> {
    let backend = MockBackend::spawn().await?;
    let ballot = Ballot::ephemeral(&backend.base_url());

    let run = ballot.run(&["polls", "show", "nope"]).await?;
    assert!(!run.status.success());
    assert!(run.stderr.contains("Poll not found"), "stderr: {}", run.stderr);
    Ok(())
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() -> anyhow::Result<()> {
    let backend = MockBackend::spawn().await?;
    let url = backend.base_url();
    drop(backend);
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let ballot = Ballot::ephemeral(&url);

    let run = ballot.run(&["polls", "list"]).await?;
    assert!(!run.status.success());
    assert!(run.stderr.contains("500"), "stderr: {}", run.stderr);
    Ok(())
}
