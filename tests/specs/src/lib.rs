// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Runs the real `ballot` binary as a subprocess, one command per process,
//! against a backend URL and an isolated state directory.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

/// Upper bound on a single command invocation.
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Resolve the path to the compiled `ballot` binary.
pub fn ballot_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("ballot")
}

/// Captured result of one `ballot` invocation.
#[derive(Debug)]
pub struct BallotRun {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl BallotRun {
    /// Parse stdout as JSON, failing with stderr attached if the command failed.
    pub fn json(&self) -> anyhow::Result<serde_json::Value> {
        anyhow::ensure!(self.status.success(), "ballot exited {}: {}", self.status, self.stderr);
        Ok(serde_json::from_str(&self.stdout)?)
    }
}

/// A configured `ballot` command line. The state directory, if any, is
/// removed on drop.
pub struct Ballot {
    base_url: String,
    state_dir: Option<tempfile::TempDir>,
}

impl Ballot {
    /// Persist the session in a fresh temporary state directory.
    pub fn persistent(base_url: &str) -> anyhow::Result<Self> {
        Ok(Self { base_url: base_url.to_owned(), state_dir: Some(tempfile::tempdir()?) })
    }

    /// Keep the session in memory only.
    pub fn ephemeral(base_url: &str) -> Self {
        Self { base_url: base_url.to_owned(), state_dir: None }
    }

    pub fn state_dir(&self) -> Option<&Path> {
        self.state_dir.as_ref().map(tempfile::TempDir::path)
    }

    /// Run one subcommand and capture its output.
    pub async fn run(&self, args: &[&str]) -> anyhow::Result<BallotRun> {
        let binary = ballot_binary();
        anyhow::ensure!(binary.exists(), "ballot binary not found at {}", binary.display());

        let mut cmd = tokio::process::Command::new(&binary);
        cmd.arg("--base-url").arg(&self.base_url);
        match self.state_dir() {
            Some(dir) => cmd.arg("--state-dir").arg(dir),
            None => cmd.arg("--ephemeral"),
        };
        cmd.args(args)
            .env_remove("BALLOT_API_BASE_URL")
            .env_remove("BALLOT_STATE_DIR")
            .env_remove("BALLOT_EPHEMERAL")
            .env_remove("BALLOT_PASSWORD")
            .env("RUST_LOG", "warn")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(TIMEOUT, cmd.output())
            .await
            .map_err(|_| anyhow::anyhow!("ballot {args:?} did not exit within {TIMEOUT:?}"))??;

        Ok(BallotRun {
            status: output.status,
            stdout: String::from_utf8(output.stdout)?,
            stderr: String::from_utf8(output.stderr)?,
        })
    }
}
