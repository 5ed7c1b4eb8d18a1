// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry-once-on-401 wrapper for authenticated calls.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::error::ApiError;
use crate::session::refresh::RefreshCoordinator;
use crate::session::{Route, SessionEvent};

/// Retries granted per guarded call after a successful refresh.
pub const AUTH_RETRY_BUDGET: u32 = 1;

#[derive(Clone)]
pub struct RequestGuard {
    coordinator: Arc<RefreshCoordinator>,
    events: broadcast::Sender<SessionEvent>,
}

impl RequestGuard {
    pub fn new(
        coordinator: Arc<RefreshCoordinator>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self { coordinator, events }
    }

    /// Run `call`, refreshing the session and retrying once if it fails with 401.
    ///
    /// When the refresh yields no session the original 401 is returned and a
    /// redirect to the login route is requested. A session left without a
    /// refresh token is dropped first. Other errors pass through.
    pub async fn guard<T, F, Fut>(&self, call: F) -> Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut budget = AUTH_RETRY_BUDGET;
        loop {
            let err = match call().await {
                Err(e) if e.is_unauthorized() && budget > 0 => e,
                other => return other,
            };

            if self.coordinator.refresh().await.is_none() {
                debug!("refresh unavailable after 401, redirecting to login");
                self.coordinator.discard_unrefreshable();
                let _ = self.events.send(SessionEvent::Navigate { route: Route::Login });
                return Err(err);
            }
            budget -= 1;
            debug!(budget, "retrying call after refresh");
        }
    }
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
