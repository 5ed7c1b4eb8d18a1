// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ballot: session-aware client for the poll backend.

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;
pub mod test_support;
pub mod token;
pub mod validate;

use std::sync::Once;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times; only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
