// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight access token refresh.
//!
//! At most one refresh request is outstanding per coordinator. Callers that
//! arrive while it is pending join it and receive the same result. The
//! in-flight slot is released by a drop guard inside the attempt, so it is
//! empty again before any waiter observes the outcome.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::api::transport::ApiTransport;
use crate::session::store::SessionStore;
use crate::session::{Session, SessionEvent, SessionState};

type PendingRefresh = Shared<BoxFuture<'static, Option<Session>>>;
type Slot = Arc<Mutex<Option<PendingRefresh>>>;

pub struct RefreshCoordinator {
    transport: Arc<ApiTransport>,
    store: SessionStore,
    state: Arc<watch::Sender<SessionState>>,
    events: broadcast::Sender<SessionEvent>,
    in_flight: Slot,
}

impl RefreshCoordinator {
    pub fn new(
        transport: Arc<ApiTransport>,
        store: SessionStore,
        state: Arc<watch::Sender<SessionState>>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self { transport, store, state, events, in_flight: Arc::new(Mutex::new(None)) }
    }

    /// Whether a refresh request is currently outstanding.
    pub fn is_refreshing(&self) -> bool {
        lock(&self.in_flight).is_some()
    }

    /// Exchange the stored refresh token for a new pair.
    ///
    /// Returns `None` without a request when no refresh token is stored. On
    /// failure the stored pair is cleared. Results from an attempt that was
    /// overtaken by a login or logout are discarded and also yield `None`.
    pub async fn refresh(&self) -> Option<Session> {
        let pending = {
            let mut slot = lock(&self.in_flight);
            match slot.as_ref() {
                Some(pending) => {
                    debug!("joining in-flight refresh");
                    pending.clone()
                }
                None => {
                    let snapshot = self.store.snapshot();
                    let Some(refresh_token) = snapshot.refresh else {
                        debug!("no refresh token stored, skipping refresh");
                        return None;
                    };
                    let pending = self.attempt(refresh_token, snapshot.generation).boxed().shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    /// Drop a session that has no refresh token to fall back on.
    ///
    /// Clears the stored pair and publishes `Unauthenticated`, unless a
    /// refresh token has appeared or the store changed since it was read.
    pub fn discard_unrefreshable(&self) {
        let snapshot = self.store.snapshot();
        if snapshot.refresh.is_some() {
            return;
        }
        if self.store.clear_if(snapshot.generation) {
            debug!(generation = snapshot.generation, "discarded session without refresh token");
            self.state.send_replace(SessionState::Unauthenticated);
        }
    }

    fn attempt(
        &self,
        refresh_token: String,
        generation: u64,
    ) -> impl Future<Output = Option<Session>> + Send {
        let transport = Arc::clone(&self.transport);
        let store = self.store.clone();
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let slot = Arc::clone(&self.in_flight);
        debug!(generation, "starting refresh");

        async move {
            let _release = InFlight(slot);

            let resp = match transport.refresh(&refresh_token).await {
                Ok(resp) if !resp.access_token.is_empty() && !resp.refresh_token.is_empty() => resp,
                Ok(_) => {
                    warn!("refresh response missing tokens");
                    fail(&store, &state, &events, generation, "refresh response missing tokens");
                    return None;
                }
                Err(e) => {
                    warn!(status = e.status, err = %e.message, "session refresh failed");
                    fail(&store, &state, &events, generation, &e.message);
                    return None;
                }
            };

            let session = Session::from(resp);
            if !store.set_tokens_if(generation, &session.access_token, &session.refresh_token) {
                debug!(generation, "session changed during refresh, discarding result");
                return None;
            }
            state.send_replace(SessionState::Authenticated { session: session.clone() });
            let _ = events.send(SessionEvent::Refreshed { username: session.username.clone() });
            info!(user = %session.username, "session refreshed");
            Some(session)
        }
    }
}

fn fail(
    store: &SessionStore,
    state: &watch::Sender<SessionState>,
    events: &broadcast::Sender<SessionEvent>,
    generation: u64,
    error: &str,
) {
    if store.clear_if(generation) {
        state.send_replace(SessionState::Unauthenticated);
    }
    let _ = events.send(SessionEvent::RefreshFailed { error: error.to_owned() });
}

/// Empties the in-flight slot on every exit path of an attempt.
struct InFlight(Slot);

impl Drop for InFlight {
    fn drop(&mut self) {
        let finished = lock(&self.0).take();
        drop(finished);
    }
}

fn lock(slot: &Slot) -> std::sync::MutexGuard<'_, Option<PendingRefresh>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
