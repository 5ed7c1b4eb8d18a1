// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fallback message when neither the body nor the status says anything useful.
const GENERIC_MESSAGE: &str = "An error occurred";

/// Error codes for backend and client-side failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiErrorCode {
    Unauthorized,
    BadRequest,
    Forbidden,
    NotFound,
    Server,
    Network,
    InvalidResponse,
    Validation,
}

impl ApiErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            400 => Self::BadRequest,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            _ => Self::Server,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest => "BAD_REQUEST",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Server => "SERVER_ERROR",
            Self::Network => "NETWORK_ERROR",
            Self::InvalidResponse => "INVALID_RESPONSE",
            Self::Validation => "VALIDATION",
        }
    }
}

impl fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform error surfaced to callers: a readable message plus the HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub status: u16,
    pub message: String,
    /// Raw response body, when the backend sent one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl ApiError {
    /// Normalize a non-2xx response.
    ///
    /// The message is the JSON `error` field if present, otherwise the text
    /// body (the backend writes plain-text errors), otherwise the reason phrase.
    pub fn from_response(status: u16, body: String) -> Self {
        let from_json = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .and_then(|r| r.error)
            .filter(|m| !m.trim().is_empty());
        let message = match from_json {
            Some(m) => m,
            None if !body.trim().is_empty() => body.trim().to_owned(),
            None => reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or(GENERIC_MESSAGE)
                .to_owned(),
        };
        let body = if body.is_empty() { None } else { Some(body) };
        Self { code: ApiErrorCode::from_status(status), status, message, body }
    }

    /// The request never produced a response.
    pub fn network(err: impl fmt::Display) -> Self {
        let message = err.to_string();
        let message = if message.is_empty() { GENERIC_MESSAGE.to_owned() } else { message };
        Self { code: ApiErrorCode::Network, status: 500, message, body: None }
    }

    /// A 2xx response whose body did not match the expected shape.
    pub fn invalid_response(status: u16, err: impl fmt::Display) -> Self {
        Self {
            code: ApiErrorCode::InvalidResponse,
            status,
            message: format!("invalid response body: {err}"),
            body: None,
        }
    }

    /// A client-side check rejected the input before any request was sent.
    pub fn validation(message: impl Into<String>) -> Self {
        Self { code: ApiErrorCode::Validation, status: 400, message: message.into(), body: None }
    }

    /// Authorization failure: the only error kind that triggers a token refresh.
    pub fn is_unauthorized(&self) -> bool {
        self.code == ApiErrorCode::Unauthorized
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Error envelope the backend may send as JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
