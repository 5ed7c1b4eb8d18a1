// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

/// Default backend for local development.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Configuration for the poll client.
#[derive(Debug, Clone, clap::Args)]
pub struct ClientConfig {
    /// Base URL of the poll backend.
    #[arg(long, default_value = DEFAULT_BASE_URL, env = "BALLOT_API_BASE_URL")]
    pub base_url: String,

    /// Directory holding the persisted session. Defaults to the XDG state dir.
    #[arg(long, env = "BALLOT_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// HTTP request timeout in milliseconds.
    #[arg(long, default_value_t = 10000, env = "BALLOT_TIMEOUT_MS")]
    pub timeout_ms: u64,

    /// Keep the session in memory only; nothing is read from or written to disk.
    #[arg(long, env = "BALLOT_EPHEMERAL")]
    pub ephemeral: bool,
}

impl ClientConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            state_dir: None,
            timeout_ms: 10000,
            ephemeral: false,
        }
    }
}
