// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application-facing client: one session context, one coordinator, and a
//! request guard around every authenticated call.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::api::models::{Poll, VoteCountsResponse, VoteResponse, VotersResponse};
use crate::api::transport::ApiTransport;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::session::context::SessionContext;
use crate::session::guard::RequestGuard;
use crate::session::store::SessionStore;
use crate::session::{Session, SessionState};
use crate::storage::{self, StorageBackend};
use crate::validate;

/// Capacity of the session event channel.
const EVENT_CAPACITY: usize = 64;

pub struct BallotClient {
    session: SessionContext,
    transport: Arc<ApiTransport>,
    guard: RequestGuard,
}

impl BallotClient {
    /// Build from config, selecting the storage backend once.
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        let backend = storage::select(config.state_dir.as_deref(), config.ephemeral);
        Self::with_storage(&config.base_url, config.timeout(), backend)
    }

    pub fn with_storage(
        base_url: &str,
        timeout: Duration,
        backend: Arc<dyn StorageBackend>,
    ) -> anyhow::Result<Self> {
        let store = SessionStore::new(backend);
        let transport = Arc::new(ApiTransport::new(base_url, timeout, store.clone())?);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let session = SessionContext::new(store, Arc::clone(&transport), events.clone());
        let guard = RequestGuard::new(session.coordinator(), events);
        Ok(Self { session, transport, guard })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn transport(&self) -> &ApiTransport {
        &self.transport
    }

    /// Reconcile persisted tokens; call once before anything else.
    pub async fn start(&self) -> SessionState {
        self.session.start().await
    }

    // -- Session --------------------------------------------------------------

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let req = validate::login(email, password)?;
        self.session.login(&req).await
    }

    pub async fn signup(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<Session, ApiError> {
        let req = validate::signup(email, username, password)?;
        self.session.signup(&req).await
    }

    pub async fn logout(&self) {
        self.session.logout().await;
    }

    // -- Polls ----------------------------------------------------------------

    pub async fn list_polls(&self) -> Result<Vec<Poll>, ApiError> {
        self.transport.list_polls().await
    }

    pub async fn get_poll(&self, id: &str) -> Result<Poll, ApiError> {
        self.transport.get_poll(id).await
    }

    pub async fn create_poll(
        &self,
        title: &str,
        description: Option<&str>,
        options: &[String],
    ) -> Result<Poll, ApiError> {
        let req = validate::create_poll(title, description, options)?;
        self.guard.guard(|| self.transport.create_poll(&req)).await
    }

    pub async fn update_poll(
        &self,
        id: &str,
        title: Option<&str>,
        description: Option<&str>,
        options: Option<&[String]>,
    ) -> Result<Poll, ApiError> {
        let req = validate::update_poll(title, description, options)?;
        self.guard.guard(|| self.transport.update_poll(id, &req)).await
    }

    pub async fn delete_poll(&self, id: &str) -> Result<(), ApiError> {
        self.guard.guard(|| self.transport.delete_poll(id)).await
    }

    // -- Votes ----------------------------------------------------------------

    pub async fn vote(&self, id: &str, option: &str) -> Result<VoteResponse, ApiError> {
        let option = validate::vote_option(option)?;
        self.guard.guard(|| self.transport.vote(id, &option)).await
    }

    pub async fn delete_vote(&self, id: &str) -> Result<(), ApiError> {
        self.guard.guard(|| self.transport.delete_vote(id)).await
    }

    pub async fn vote_counts(&self, id: &str) -> Result<VoteCountsResponse, ApiError> {
        self.transport.vote_counts(id).await
    }

    pub async fn voters_by_option(
        &self,
        id: &str,
        option: &str,
    ) -> Result<VotersResponse, ApiError> {
        self.transport.voters_by_option(id, option).await
    }
}
