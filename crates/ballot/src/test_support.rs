// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: token minting and an in-process poll backend.
//!
//! [`MockBackend`] serves the full REST surface on a random local port with
//! knobs for failure injection (forced 401s, refresh/logout status, refresh
//! latency) and call counters for asserting request counts.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU16, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;

use crate::api::models::{
    AuthResponse, CreatePollRequest, CreateUserRequest, LoginRequest, Poll, RefreshTokenRequest,
    UpdatePollRequest, UserInfo, VoteCountsResponse, VoteRequest, VoteResponse, VotersResponse,
};
use crate::api::transport::ApiTransport;
use crate::session::context::SessionContext;
use crate::session::store::SessionStore;
use crate::storage::MemoryStorage;
use crate::token;

/// Timestamp stamped on every mock record.
const FIXED_TIMESTAMP: &str = "2026-01-01T00:00:00Z";

/// Default lifetime of access tokens issued by the mock.
const DEFAULT_ACCESS_TTL_SECS: i64 = 900;

/// Encode `payload` as an unsigned JWT (`header.payload.sig`).
pub fn mint_token<T: Serialize>(payload: &T) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap_or_default());
    format!("{header}.{body}.c2ln")
}

/// Access token for the given identity expiring `expires_in_secs` from now
/// (negative for already expired).
pub fn access_token(user_id: &str, email: &str, username: &str, expires_in_secs: i64) -> String {
    let now = (token::epoch_ms() / 1000) as i64;
    mint_token(&serde_json::json!({
        "user_id": user_id,
        "email": email,
        "username": username,
        "iat": now,
        "nbf": now,
        "exp": now + expires_in_secs,
    }))
}

/// Session context over in-memory storage, wired to a fresh mock backend.
pub async fn session_harness() -> anyhow::Result<(MockBackend, SessionContext)> {
    let backend = MockBackend::spawn().await?;
    let store = SessionStore::new(Arc::new(MemoryStorage::new()));
    let transport =
        Arc::new(ApiTransport::new(&backend.base_url(), Duration::from_secs(5), store.clone())?);
    let (events, _) = tokio::sync::broadcast::channel(64);
    Ok((backend, SessionContext::new(store, transport, events)))
}

/// A mock backend bound to `127.0.0.1:0`. Aborted on drop.
pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    handle: tokio::task::JoinHandle<()>,
}

impl MockBackend {
    pub async fn spawn() -> anyhow::Result<Self> {
        crate::ensure_crypto();
        let state = Arc::new(MockState::new());
        let router = router(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Ok(Self { addr, state, handle })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Backend state plus failure-injection knobs.
pub struct MockState {
    pub refresh_calls: AtomicU32,
    pub logout_calls: AtomicU32,
    /// Requests to endpoints that require a bearer token.
    pub authed_calls: AtomicU32,
    pub refresh_delay_ms: AtomicU64,
    /// Non-zero: refresh answers with this status.
    pub refresh_status: AtomicU16,
    /// Non-zero: logout answers with this status.
    pub logout_status: AtomicU16,
    /// Remaining authenticated requests to reject with 401 regardless of token.
    pub force_unauthorized: AtomicU32,
    pub access_ttl_secs: AtomicI64,
    data: Mutex<Data>,
}

#[derive(Default)]
struct Data {
    users: Vec<MockUser>,
    /// access token -> user id
    access: HashMap<String, String>,
    /// refresh token -> user id
    refresh: HashMap<String, String>,
    polls: Vec<Poll>,
    votes: Vec<MockVote>,
    next_id: u64,
}

impl Data {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn user(&self, id: &str) -> Option<&MockUser> {
        self.users.iter().find(|u| u.id == id)
    }

    fn poll_mut(&mut self, id: &str) -> Option<&mut Poll> {
        self.polls.iter_mut().find(|p| p.id == id)
    }
}

#[derive(Debug, Clone)]
pub struct MockUser {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password: String,
}

impl MockUser {
    fn info(&self) -> UserInfo {
        UserInfo { id: self.id.clone(), email: self.email.clone(), username: self.username.clone() }
    }
}

#[derive(Debug, Clone)]
struct MockVote {
    id: String,
    poll_id: String,
    user_id: String,
    option: String,
}

impl Default for MockState {
    fn default() -> Self {
        Self::new()
    }
}

impl MockState {
    pub fn new() -> Self {
        Self {
            refresh_calls: AtomicU32::new(0),
            logout_calls: AtomicU32::new(0),
            authed_calls: AtomicU32::new(0),
            refresh_delay_ms: AtomicU64::new(0),
            refresh_status: AtomicU16::new(0),
            logout_status: AtomicU16::new(0),
            force_unauthorized: AtomicU32::new(0),
            access_ttl_secs: AtomicI64::new(DEFAULT_ACCESS_TTL_SECS),
            data: Mutex::new(Data::default()),
        }
    }

    fn data(&self) -> MutexGuard<'_, Data> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_user(&self, email: &str, username: &str, password: &str) -> MockUser {
        let mut data = self.data();
        let user = MockUser {
            id: data.next_id("user"),
            email: email.to_owned(),
            username: username.to_owned(),
            password: password.to_owned(),
        };
        data.users.push(user.clone());
        user
    }

    /// Issue and register a fresh access/refresh pair for `user`.
    pub fn issue(&self, user: &MockUser) -> AuthResponse {
        let ttl = self.access_ttl_secs.load(Ordering::Relaxed);
        let mut data = self.data();
        let nonce = data.next_id("jti");
        let now = (token::epoch_ms() / 1000) as i64;
        let access = mint_token(&serde_json::json!({
            "user_id": user.id,
            "email": user.email,
            "username": user.username,
            "iat": now,
            "exp": now + ttl,
            "jti": nonce,
        }));
        let refresh = format!("refresh-{nonce}");
        data.access.insert(access.clone(), user.id.clone());
        data.refresh.insert(refresh.clone(), user.id.clone());
        AuthResponse {
            access_token: access,
            refresh_token: refresh,
            user_id: user.id.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
        }
    }

    /// Accept `token` as an access token for `user_id`.
    pub fn accept_access(&self, token: &str, user_id: &str) {
        self.data().access.insert(token.to_owned(), user_id.to_owned());
    }

    /// Accept `token` as a refresh token for `user_id`.
    pub fn accept_refresh(&self, token: &str, user_id: &str) {
        self.data().refresh.insert(token.to_owned(), user_id.to_owned());
    }

    pub fn revoke_access(&self, token: &str) {
        self.data().access.remove(token);
    }

    pub fn refresh_token_count(&self) -> usize {
        self.data().refresh.len()
    }

    pub fn add_poll(&self, owner_id: &str, title: &str, options: &[&str]) -> Poll {
        let mut data = self.data();
        let poll = Poll {
            id: data.next_id("poll"),
            title: title.to_owned(),
            description: None,
            options: options.iter().map(|o| (*o).to_owned()).collect(),
            owner_id: owner_id.to_owned(),
            created_at: FIXED_TIMESTAMP.to_owned(),
            updated_at: FIXED_TIMESTAMP.to_owned(),
            vote_counts: None,
            voters_by_option: None,
        };
        data.polls.push(poll.clone());
        poll
    }

    pub fn poll(&self, id: &str) -> Option<Poll> {
        self.data().polls.iter().find(|p| p.id == id).cloned()
    }

    pub fn vote_count(&self, poll_id: &str) -> usize {
        self.data().votes.iter().filter(|v| v.poll_id == poll_id).count()
    }

    /// Resolve the bearer token to a user id, honoring forced 401s and expiry.
    fn authenticate(&self, headers: &HeaderMap) -> Result<String, Response> {
        self.authed_calls.fetch_add(1, Ordering::Relaxed);
        let forced = self.force_unauthorized.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
            n.checked_sub(1)
        });
        if forced.is_ok() {
            return Err(fail(StatusCode::UNAUTHORIZED, "Unauthorized"));
        }
        let bearer = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "Unauthorized"))?;
        if token::is_expired(bearer) {
            return Err(fail(StatusCode::UNAUTHORIZED, "token expired"));
        }
        self.data()
            .access
            .get(bearer)
            .cloned()
            .ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}

fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/api/users", post(register))
        .route("/api/users/login", post(login))
        .route("/api/users/refresh", post(refresh))
        .route("/api/users/logout", post(logout))
        .route("/api/polls", get(list_polls).post(create_poll))
        .route("/api/polls/{id}", get(get_poll).put(update_poll).delete(delete_poll))
        .route("/api/polls/{id}/vote", post(vote).delete(delete_vote))
        .route("/api/polls/{id}/votes", get(vote_counts))
        .route("/api/polls/{id}/votes/{option}", get(voters))
        .with_state(state)
}

/// Plain-text error body, as the real backend writes them.
fn fail(status: StatusCode, message: &str) -> Response {
    (status, format!("{message}\n")).into_response()
}

// -- Users --------------------------------------------------------------------

async fn register(
    State(s): State<Arc<MockState>>,
    Json(req): Json<CreateUserRequest>,
) -> Response {
    if s.data().users.iter().any(|u| u.email == req.email) {
        return fail(StatusCode::BAD_REQUEST, "user already exists");
    }
    let user = s.add_user(&req.email, &req.username, &req.password);
    (StatusCode::CREATED, Json(s.issue(&user))).into_response()
}

async fn login(State(s): State<Arc<MockState>>, Json(req): Json<LoginRequest>) -> Response {
    let user =
        s.data().users.iter().find(|u| u.email == req.email && u.password == req.password).cloned();
    match user {
        Some(user) => Json(s.issue(&user)).into_response(),
        None => fail(StatusCode::UNAUTHORIZED, "invalid credentials"),
    }
}

async fn refresh(
    State(s): State<Arc<MockState>>,
    Json(req): Json<RefreshTokenRequest>,
) -> Response {
    s.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = s.refresh_delay_ms.load(Ordering::Relaxed);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let forced = s.refresh_status.load(Ordering::Relaxed);
    if forced != 0 {
        let status = StatusCode::from_u16(forced).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return fail(status, "Invalid refresh token");
    }
    let user = {
        let mut data = s.data();
        let Some(user_id) = data.refresh.remove(&req.refresh_token) else {
            return fail(StatusCode::UNAUTHORIZED, "Invalid refresh token");
        };
        match data.user(&user_id).cloned() {
            Some(user) => user,
            None => return fail(StatusCode::NOT_FOUND, "User not found"),
        }
    };
    Json(s.issue(&user)).into_response()
}

async fn logout(State(s): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    s.logout_calls.fetch_add(1, Ordering::SeqCst);
    let forced = s.logout_status.load(Ordering::Relaxed);
    if forced != 0 {
        let status = StatusCode::from_u16(forced).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return fail(status, "Internal server error");
    }
    let user_id = match s.authenticate(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    s.data().refresh.retain(|_, owner| *owner != user_id);
    StatusCode::NO_CONTENT.into_response()
}

// -- Polls --------------------------------------------------------------------

async fn list_polls(State(s): State<Arc<MockState>>) -> Response {
    Json(s.data().polls.clone()).into_response()
}

async fn get_poll(State(s): State<Arc<MockState>>, Path(id): Path<String>) -> Response {
    let data = s.data();
    let Some(mut poll) = data.polls.iter().find(|p| p.id == id).cloned() else {
        return fail(StatusCode::NOT_FOUND, "Poll not found");
    };
    let votes: Vec<&MockVote> = data.votes.iter().filter(|v| v.poll_id == id).collect();
    if !votes.is_empty() {
        let mut counts = BTreeMap::new();
        let mut voters: BTreeMap<String, Vec<UserInfo>> = BTreeMap::new();
        for vote in votes {
            *counts.entry(vote.option.clone()).or_insert(0) += 1;
            if let Some(user) = data.user(&vote.user_id) {
                voters.entry(vote.option.clone()).or_default().push(user.info());
            }
        }
        poll.vote_counts = Some(counts);
        poll.voters_by_option = Some(voters);
    }
    Json(poll).into_response()
}

async fn create_poll(
    State(s): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(req): Json<CreatePollRequest>,
) -> Response {
    let user_id = match s.authenticate(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if req.title.is_empty() {
        return fail(StatusCode::BAD_REQUEST, "title is required");
    }
    if req.options.len() < 2 {
        return fail(StatusCode::BAD_REQUEST, "poll must have at least 2 options");
    }
    let options: Vec<&str> = req.options.iter().map(String::as_str).collect();
    let mut poll = s.add_poll(&user_id, &req.title, &options);
    if let Some(description) = req.description {
        if let Some(stored) = s.data().poll_mut(&poll.id) {
            stored.description = Some(description.clone());
        }
        poll.description = Some(description);
    }
    (StatusCode::CREATED, Json(poll)).into_response()
}

async fn update_poll(
    State(s): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdatePollRequest>,
) -> Response {
    let user_id = match s.authenticate(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let mut data = s.data();
    let Some(poll) = data.poll_mut(&id) else {
        return fail(StatusCode::BAD_REQUEST, "poll not found");
    };
    if poll.owner_id != user_id {
        return fail(StatusCode::BAD_REQUEST, "only poll owner can update the poll");
    }
    if let Some(options) = &req.options {
        if options.len() < 2 {
            return fail(StatusCode::BAD_REQUEST, "poll must have at least 2 options");
        }
    }
    if let Some(title) = req.title {
        poll.title = title;
    }
    if let Some(description) = req.description {
        poll.description = Some(description);
    }
    if let Some(options) = req.options {
        poll.options = options;
    }
    Json(poll.clone()).into_response()
}

async fn delete_poll(
    State(s): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let user_id = match s.authenticate(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let mut data = s.data();
    let Some(poll) = data.polls.iter().find(|p| p.id == id) else {
        return fail(StatusCode::BAD_REQUEST, "poll not found");
    };
    if poll.owner_id != user_id {
        return fail(StatusCode::BAD_REQUEST, "only poll owner can delete the poll");
    }
    data.polls.retain(|p| p.id != id);
    data.votes.retain(|v| v.poll_id != id);
    StatusCode::NO_CONTENT.into_response()
}

// -- Votes --------------------------------------------------------------------

async fn vote(
    State(s): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> Response {
    let user_id = match s.authenticate(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let mut data = s.data();
    let Some(poll) = data.polls.iter().find(|p| p.id == id) else {
        return fail(StatusCode::BAD_REQUEST, "poll not found");
    };
    if !poll.options.contains(&req.option) {
        return fail(StatusCode::BAD_REQUEST, "invalid option");
    }
    if data.votes.iter().any(|v| v.poll_id == id && v.user_id == user_id) {
        return fail(StatusCode::BAD_REQUEST, "user has already voted on this poll");
    }
    let vote = MockVote { id: data.next_id("vote"), poll_id: id, user_id, option: req.option };
    data.votes.push(vote.clone());
    let body = VoteResponse {
        option: vote.option,
        id: Some(vote.id),
        user_id: Some(vote.user_id),
        poll_id: Some(vote.poll_id),
        created_at: Some(FIXED_TIMESTAMP.to_owned()),
    };
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn delete_vote(
    State(s): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let user_id = match s.authenticate(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let mut data = s.data();
    if !data.polls.iter().any(|p| p.id == id) {
        return fail(StatusCode::NOT_FOUND, "poll not found");
    }
    let before = data.votes.len();
    data.votes.retain(|v| !(v.poll_id == id && v.user_id == user_id));
    if data.votes.len() == before {
        return fail(StatusCode::NOT_FOUND, "vote not found");
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn vote_counts(State(s): State<Arc<MockState>>, Path(id): Path<String>) -> Response {
    let data = s.data();
    let Some(poll) = data.polls.iter().find(|p| p.id == id) else {
        return fail(StatusCode::NOT_FOUND, "Poll not found");
    };
    let mut counts: BTreeMap<String, u64> = poll.options.iter().map(|o| (o.clone(), 0)).collect();
    for vote in data.votes.iter().filter(|v| v.poll_id == id) {
        *counts.entry(vote.option.clone()).or_insert(0) += 1;
    }
    Json(VoteCountsResponse { poll_id: Some(id), counts }).into_response()
}

async fn voters(
    State(s): State<Arc<MockState>>,
    Path((id, option)): Path<(String, String)>,
) -> Response {
    let data = s.data();
    let Some(poll) = data.polls.iter().find(|p| p.id == id) else {
        return fail(StatusCode::NOT_FOUND, "poll not found");
    };
    if !poll.options.contains(&option) {
        return fail(StatusCode::NOT_FOUND, "option not found");
    }
    let voters = data
        .votes
        .iter()
        .filter(|v| v.poll_id == id && v.option == option)
        .filter_map(|v| data.user(&v.user_id).map(MockUser::info))
        .collect();
    Json(VotersResponse { poll_id: Some(id), option, voters }).into_response()
}
