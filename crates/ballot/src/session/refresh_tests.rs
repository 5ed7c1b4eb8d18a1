// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::session::{SessionEvent, SessionState};
use crate::test_support::{access_token, session_harness};

#[tokio::test]
async fn concurrent_refreshes_share_one_request() -> anyhow::Result<()> {
    let (backend, ctx) = session_harness().await?;
    let user = backend.state.add_user("ada@example.com", "ada", "pw");
    backend.state.accept_refresh("R", &user.id);
    backend.state.refresh_delay_ms.store(100, Ordering::Relaxed);
    ctx.store().set_tokens("stale", "R");

    let coordinator = ctx.coordinator();
    let (first, second) = tokio::join!(coordinator.refresh(), coordinator.refresh());

    assert_eq!(backend.state.refresh_calls.load(Ordering::SeqCst), 1);
    let first = first.ok_or_else(|| anyhow::anyhow!("refresh failed"))?;
    assert_eq!(second.as_ref(), Some(&first));
    assert_eq!(first.username, "ada");
    assert_eq!(ctx.store().access_token().as_deref(), Some(first.access_token.as_str()));
    assert_eq!(ctx.store().refresh_token().as_deref(), Some(first.refresh_token.as_str()));
    assert_ne!(first.refresh_token, "R");
    Ok(())
}

#[tokio::test]
async fn success_publishes_state_and_event() -> anyhow::Result<()> {
    let (backend, ctx) = session_harness().await?;
    let user = backend.state.add_user("ada@example.com", "ada", "pw");
    backend.state.accept_refresh("R", &user.id);
    ctx.store().set_tokens("stale", "R");
    let mut events = ctx.subscribe();

    let session = ctx.refresh().await.ok_or_else(|| anyhow::anyhow!("refresh failed"))?;

    assert_eq!(ctx.state(), SessionState::Authenticated { session });
    assert_eq!(events.try_recv()?, SessionEvent::Refreshed { username: "ada".to_owned() });
    Ok(())
}

#[tokio::test]
async fn no_refresh_token_skips_request() -> anyhow::Result<()> {
    let (backend, ctx) = session_harness().await?;
    let mut events = ctx.subscribe();

    assert_eq!(ctx.refresh().await, None);
    assert_eq!(backend.state.refresh_calls.load(Ordering::SeqCst), 0);
    assert!(events.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn rejected_refresh_clears_store() -> anyhow::Result<()> {
    let (backend, ctx) = session_harness().await?;
    ctx.store().set_tokens("stale", "unknown");
    let mut events = ctx.subscribe();

    assert_eq!(ctx.refresh().await, None);

    assert_eq!(backend.state.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.store().access_token(), None);
    assert_eq!(ctx.store().refresh_token(), None);
    assert_eq!(ctx.state(), SessionState::Unauthenticated);
    assert!(matches!(events.try_recv()?, SessionEvent::RefreshFailed { .. }));
    Ok(())
}

#[tokio::test]
async fn server_error_also_clears_store() -> anyhow::Result<()> {
    let (backend, ctx) = session_harness().await?;
    let user = backend.state.add_user("ada@example.com", "ada", "pw");
    backend.state.accept_refresh("R", &user.id);
    backend.state.refresh_status.store(500, Ordering::Relaxed);
    ctx.store().set_tokens("stale", "R");

    assert_eq!(ctx.refresh().await, None);
    assert_eq!(ctx.store().refresh_token(), None);
    Ok(())
}

#[tokio::test]
async fn unreachable_backend_clears_store() -> anyhow::Result<()> {
    let (backend, ctx) = session_harness().await?;
    ctx.store().set_tokens("stale", "R");
    drop(backend);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(ctx.refresh().await, None);
    assert_eq!(ctx.store().access_token(), None);
    Ok(())
}

#[tokio::test]
async fn slot_released_after_completion() -> anyhow::Result<()> {
    let (backend, ctx) = session_harness().await?;
    let user = backend.state.add_user("ada@example.com", "ada", "pw");
    backend.state.accept_refresh("R", &user.id);
    ctx.store().set_tokens("stale", "R");
    let coordinator = ctx.coordinator();

    assert!(coordinator.refresh().await.is_some());
    assert!(!coordinator.is_refreshing());

    // The rotated refresh token is used for a second, independent request.
    assert!(coordinator.refresh().await.is_some());
    assert_eq!(backend.state.refresh_calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn slot_released_after_failure() -> anyhow::Result<()> {
    let (backend, ctx) = session_harness().await?;
    ctx.store().set_tokens("stale", "unknown");
    let coordinator = ctx.coordinator();

    assert_eq!(coordinator.refresh().await, None);
    assert!(!coordinator.is_refreshing());

    let user = backend.state.add_user("ada@example.com", "ada", "pw");
    backend.state.accept_refresh("R2", &user.id);
    ctx.store().set_tokens("stale", "R2");
    assert!(coordinator.refresh().await.is_some());
    Ok(())
}

#[tokio::test]
async fn logout_during_refresh_is_not_resurrected() -> anyhow::Result<()> {
    let (backend, ctx) = session_harness().await?;
    let user = backend.state.add_user("ada@example.com", "ada", "pw");
    backend.state.accept_refresh("R", &user.id);
    backend.state.refresh_delay_ms.store(200, Ordering::Relaxed);
    ctx.store().set_tokens("stale", "R");

    let coordinator = ctx.coordinator();
    let pending = tokio::spawn(async move { coordinator.refresh().await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(ctx.coordinator().is_refreshing());
    ctx.store().clear();

    assert_eq!(pending.await?, None);
    assert_eq!(ctx.store().access_token(), None);
    assert_eq!(ctx.store().refresh_token(), None);
    Ok(())
}

#[tokio::test]
async fn failed_refresh_after_login_keeps_new_session() -> anyhow::Result<()> {
    let (backend, ctx) = session_harness().await?;
    backend.state.refresh_status.store(401, Ordering::Relaxed);
    backend.state.refresh_delay_ms.store(200, Ordering::Relaxed);
    ctx.store().set_tokens("stale", "R");

    let coordinator = ctx.coordinator();
    let pending = tokio::spawn(async move { coordinator.refresh().await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    let fresh = access_token("user-9", "bob@example.com", "bob", 600);
    ctx.store().set_tokens(&fresh, "R9");

    assert_eq!(pending.await?, None);
    assert_eq!(ctx.store().access_token(), Some(fresh));
    assert_eq!(ctx.store().refresh_token().as_deref(), Some("R9"));
    Ok(())
}
