// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owner of the in-memory session.
//!
//! Reconciles persisted tokens at startup and handles login, signup and
//! logout. The current [`SessionState`] is published on a watch channel that
//! the refresh coordinator also writes to, so a refresh anywhere in the
//! application replaces the session seen by everyone.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::api::models::{CreateUserRequest, LoginRequest};
use crate::api::transport::ApiTransport;
use crate::error::ApiError;
use crate::session::refresh::RefreshCoordinator;
use crate::session::store::SessionStore;
use crate::session::{Route, Session, SessionEvent, SessionState};
use crate::token;

pub struct SessionContext {
    store: SessionStore,
    transport: Arc<ApiTransport>,
    coordinator: Arc<RefreshCoordinator>,
    state: Arc<watch::Sender<SessionState>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionContext {
    pub fn new(
        store: SessionStore,
        transport: Arc<ApiTransport>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        let state = Arc::new(state);
        let coordinator = Arc::new(RefreshCoordinator::new(
            Arc::clone(&transport),
            store.clone(),
            Arc::clone(&state),
            events.clone(),
        ));
        Self { store, transport, coordinator, state, events }
    }

    /// Handle to the coordinator shared by every request guard.
    pub fn coordinator(&self) -> Arc<RefreshCoordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Rebuild the session from persisted tokens.
    ///
    /// A valid access token is used as-is. An invalid one is exchanged via the
    /// refresh token when there is one; otherwise, or if that fails, the store
    /// is cleared.
    pub async fn start(&self) -> SessionState {
        self.state.send_replace(SessionState::Loading);
        let snapshot = self.store.snapshot();
        let generation = snapshot.generation;
        let can_refresh = snapshot.refresh.is_some();

        let next = match snapshot.access {
            None => {
                debug!("no stored access token");
                SessionState::Unauthenticated
            }
            Some(access) => match restore(&access, snapshot.refresh) {
                Some(session) => {
                    debug!(user = %session.username, "restored session from stored token");
                    SessionState::Authenticated { session }
                }
                None if can_refresh => {
                    debug!("stored access token unusable, refreshing");
                    match self.coordinator.refresh().await {
                        Some(session) => SessionState::Authenticated { session },
                        None => {
                            self.store.clear_if(generation);
                            SessionState::Unauthenticated
                        }
                    }
                }
                None => {
                    debug!("stored access token unusable and no refresh token");
                    self.store.clear_if(generation);
                    SessionState::Unauthenticated
                }
            },
        };

        self.state.send_replace(next.clone());
        next
    }

    /// Exchange credentials for a session.
    pub async fn login(&self, req: &LoginRequest) -> Result<Session, ApiError> {
        let session = Session::from(self.transport.login(req).await?);
        self.establish(&session);
        info!(user = %session.username, "logged in");
        Ok(session)
    }

    /// Register an account and start a session for it.
    pub async fn signup(&self, req: &CreateUserRequest) -> Result<Session, ApiError> {
        let session = Session::from(self.transport.register(req).await?);
        self.establish(&session);
        info!(user = %session.username, "signed up");
        Ok(session)
    }

    /// Single-flight refresh through the shared coordinator.
    pub async fn refresh(&self) -> Option<Session> {
        self.coordinator.refresh().await
    }

    /// Revoke server-side if possible, then always drop local state.
    pub async fn logout(&self) {
        if self.store.access_token().is_some() {
            if let Err(e) = self.transport.logout().await {
                warn!(status = e.status, err = %e.message, "server logout failed, clearing local session");
            }
        }
        self.store.clear();
        self.state.send_replace(SessionState::Unauthenticated);
        let _ = self.events.send(SessionEvent::LoggedOut);
        let _ = self.events.send(SessionEvent::Navigate { route: Route::Login });
        info!("logged out");
    }

    /// The backend response is trusted as issued; no token inspection here.
    fn establish(&self, session: &Session) {
        self.store.set_tokens(&session.access_token, &session.refresh_token);
        self.state.send_replace(SessionState::Authenticated { session: session.clone() });
        let _ = self.events.send(SessionEvent::LoggedIn { username: session.username.clone() });
        let _ = self.events.send(SessionEvent::Navigate { route: Route::Home });
    }
}

/// Session for a stored access token that passes validation.
fn restore(access: &str, refresh: Option<String>) -> Option<Session> {
    if !token::is_valid(access) {
        return None;
    }
    let identity = token::decode(access)?.identity()?;
    Some(Session::from_identity(access.to_owned(), refresh.unwrap_or_default(), identity))
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
