// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the poll backend.
//!
//! Pass-through calls only: no retries and no refresh handling. Authenticated
//! calls read the current access token from the [`SessionStore`] at send time
//! and are expected to be wrapped by the request guard.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::models::{
    AuthResponse, CreatePollRequest, CreateUserRequest, LoginRequest, Poll, RefreshTokenRequest,
    UpdatePollRequest, VoteCountsResponse, VoteRequest, VoteResponse, VotersResponse,
};
use crate::error::ApiError;
use crate::session::store::SessionStore;

pub struct ApiTransport {
    base_url: Url,
    store: SessionStore,
    client: Client,
}

impl ApiTransport {
    pub fn new(base_url: &str, timeout: Duration, store: SessionStore) -> anyhow::Result<Self> {
        crate::ensure_crypto();
        let base_url = Url::parse(base_url)
            .map_err(|e| anyhow::anyhow!("invalid base url {base_url:?}: {e}"))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("invalid base url {base_url}: not a hierarchical URL");
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, store, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // -- Users ----------------------------------------------------------------

    /// `POST /api/users`
    pub async fn register(&self, body: &CreateUserRequest) -> Result<AuthResponse, ApiError> {
        self.send(self.request(Method::POST, &["api", "users"]).json(body)).await
    }

    /// `POST /api/users/login`
    pub async fn login(&self, body: &LoginRequest) -> Result<AuthResponse, ApiError> {
        self.send(self.request(Method::POST, &["api", "users", "login"]).json(body)).await
    }

    /// `POST /api/users/refresh`. Unauthenticated: the body carries the credential.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, ApiError> {
        let body = RefreshTokenRequest { refresh_token: refresh_token.to_owned() };
        self.send(self.request(Method::POST, &["api", "users", "refresh"]).json(&body)).await
    }

    /// `POST /api/users/logout`: revokes the caller's refresh tokens server-side.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.send_empty(self.authed(Method::POST, &["api", "users", "logout"])).await
    }

    // -- Polls ----------------------------------------------------------------

    /// `GET /api/polls`
    pub async fn list_polls(&self) -> Result<Vec<Poll>, ApiError> {
        self.send(self.request(Method::GET, &["api", "polls"])).await
    }

    /// `GET /api/polls/{id}`
    pub async fn get_poll(&self, id: &str) -> Result<Poll, ApiError> {
        self.send(self.request(Method::GET, &["api", "polls", id])).await
    }

    /// `POST /api/polls`
    pub async fn create_poll(&self, body: &CreatePollRequest) -> Result<Poll, ApiError> {
        self.send(self.authed(Method::POST, &["api", "polls"]).json(body)).await
    }

    /// `PUT /api/polls/{id}`
    pub async fn update_poll(&self, id: &str, body: &UpdatePollRequest) -> Result<Poll, ApiError> {
        self.send(self.authed(Method::PUT, &["api", "polls", id]).json(body)).await
    }

    /// `DELETE /api/polls/{id}`
    pub async fn delete_poll(&self, id: &str) -> Result<(), ApiError> {
        self.send_empty(self.authed(Method::DELETE, &["api", "polls", id])).await
    }

    // -- Votes ----------------------------------------------------------------

    /// `POST /api/polls/{id}/vote`
    pub async fn vote(&self, id: &str, option: &str) -> Result<VoteResponse, ApiError> {
        let body = VoteRequest { option: option.to_owned() };
        self.send(self.authed(Method::POST, &["api", "polls", id, "vote"]).json(&body)).await
    }

    /// `DELETE /api/polls/{id}/vote`
    pub async fn delete_vote(&self, id: &str) -> Result<(), ApiError> {
        self.send_empty(self.authed(Method::DELETE, &["api", "polls", id, "vote"])).await
    }

    /// `GET /api/polls/{id}/votes`
    pub async fn vote_counts(&self, id: &str) -> Result<VoteCountsResponse, ApiError> {
        self.send(self.request(Method::GET, &["api", "polls", id, "votes"])).await
    }

    /// `GET /api/polls/{id}/votes/{option}`
    pub async fn voters_by_option(
        &self,
        id: &str,
        option: &str,
    ) -> Result<VotersResponse, ApiError> {
        self.send(self.request(Method::GET, &["api", "polls", id, "votes", option])).await
    }

    // -- Plumbing -------------------------------------------------------------

    /// Base URL plus percent-encoded path segments.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.endpoint(segments);
        debug!(%method, path = url.path(), "api request");
        self.client.request(method, url)
    }

    fn authed(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let req = self.request(method, segments);
        match self.store.access_token() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let (status, bytes) = Self::execute(req).await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::invalid_response(status, e))
    }

    async fn send_empty(&self, req: RequestBuilder) -> Result<(), ApiError> {
        Self::execute(req).await.map(|_| ())
    }

    async fn execute(req: RequestBuilder) -> Result<(u16, Vec<u8>), ApiError> {
        let resp = req.send().await.map_err(ApiError::network)?;
        let status = resp.status().as_u16();
        let success = resp.status().is_success();
        let body = resp.bytes().await.map_err(ApiError::network)?;
        if !success {
            return Err(ApiError::from_response(status, String::from_utf8_lossy(&body).into_owned()));
        }
        Ok((status, body.to_vec()))
    }
}
