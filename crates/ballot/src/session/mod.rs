// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client session lifecycle: persisted tokens, single-flight refresh,
//! retry-on-401 guarding, and the authenticated-user view.

pub mod context;
pub mod guard;
pub mod refresh;
pub mod store;

use serde::{Deserialize, Serialize};

use crate::api::models::AuthResponse;
use crate::token::Identity;

/// An authenticated session. Replaced wholesale, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub email: String,
    pub username: String,
}

impl Session {
    pub fn from_identity(access_token: String, refresh_token: String, identity: Identity) -> Self {
        Self {
            access_token,
            refresh_token,
            user_id: identity.user_id,
            email: identity.email,
            username: identity.username,
        }
    }
}

impl From<AuthResponse> for Session {
    fn from(resp: AuthResponse) -> Self {
        Self {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            user_id: resp.user_id,
            email: resp.email,
            username: resp.username,
        }
    }
}

/// What the rest of the application sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Loading,
    Authenticated { session: Session },
    Unauthenticated,
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated { session } => Some(session),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

/// Navigation targets the session layer can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Home,
    Login,
}

/// Events emitted by the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    LoggedIn { username: String },
    LoggedOut,
    Refreshed { username: String },
    RefreshFailed { error: String },
    Navigate { route: Route },
}
