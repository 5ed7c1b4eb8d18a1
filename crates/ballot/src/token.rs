// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer token inspection without a server round trip.
//!
//! Only the payload is read. Signatures are the backend's business; the client
//! trusts whatever the backend issued and only checks structure and expiry.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Tokens within this many milliseconds of `exp` count as expired.
pub const CLOCK_SKEW_MS: i64 = 5_000;

/// base64url with optional padding, as JWT segments appear in the wild.
const SEGMENT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims carried in an access token payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identifier.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    /// Issued-at, epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Not-before, epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    /// Expiry, epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// The three identity fields, all present and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub username: String,
}

impl Claims {
    pub fn identity(&self) -> Option<Identity> {
        let field = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(str::to_owned);
        Some(Identity {
            user_id: field(&self.user_id)?,
            email: field(&self.email)?,
            username: field(&self.username)?,
        })
    }
}

/// Decode the payload segment. Malformed input of any kind yields `None`.
pub fn decode(token: &str) -> Option<Claims> {
    let payload = token.split('.').nth(1)?;
    let bytes = SEGMENT_ENGINE.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Expired if undecodable, missing `exp`, or inside the skew window at `now_ms`.
pub fn is_expired_at(token: &str, now_ms: u64) -> bool {
    let Some(exp) = decode(token).and_then(|c| c.exp) else {
        return true;
    };
    let expires_ms = exp.saturating_mul(1000).saturating_sub(CLOCK_SKEW_MS);
    i64::try_from(now_ms).unwrap_or(i64::MAX) >= expires_ms
}

pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, epoch_ms())
}

/// Non-empty, decodable, complete identity, and not expired at `now_ms`.
pub fn is_valid_at(token: &str, now_ms: u64) -> bool {
    if token.is_empty() {
        return false;
    }
    match decode(token) {
        Some(claims) if claims.identity().is_some() => !is_expired_at(token, now_ms),
        _ => false,
    }
}

pub fn is_valid(token: &str) -> bool {
    is_valid_at(token, epoch_ms())
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
