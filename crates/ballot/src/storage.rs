// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent key/value backends for client-side session state.
//!
//! The backend is chosen once at startup. Callers never branch on whether
//! persistent storage exists: without it they get [`NullStorage`], which
//! silently drops writes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

/// File name of the persisted key/value map inside the state directory.
pub const STORAGE_FILE: &str = "session.json";

/// String key/value store. Never fails: I/O problems are logged and swallowed.
pub trait StorageBackend: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Write every entry in one step.
    fn set_all(&self, entries: &[(&str, &str)]);

    /// Remove every key in one step.
    fn remove_all(&self, keys: &[&str]);
}

/// Backend for environments without persistent storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStorage;

impl StorageBackend for NullStorage {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set_all(&self, _entries: &[(&str, &str)]) {}

    fn remove_all(&self, _keys: &[&str]) {}
}

/// Process-local map.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set_all(&self, entries: &[(&str, &str)]) {
        let mut map = self.entries();
        for (k, v) in entries {
            map.insert((*k).to_owned(), (*v).to_owned());
        }
    }

    fn remove_all(&self, keys: &[&str]) {
        let mut map = self.entries();
        for k in keys {
            map.remove(*k);
        }
    }
}

/// JSON object file on disk, rewritten atomically (write tmp + rename).
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path, write_lock: Mutex::new(()) }
    }

    /// Storage file inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(STORAGE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> HashMap<String, String> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) => {
                debug!(path = %self.path.display(), "no persisted session: {e}");
                return HashMap::new();
            }
        };
        match serde_json::from_str(&data) {
            Ok(map) => map,
            Err(e) => {
                warn!(path = %self.path.display(), "failed to parse persisted session: {e}");
                HashMap::new()
            }
        }
    }

    fn modify(&self, apply: impl FnOnce(&mut HashMap<String, String>)) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.load();
        apply(&mut map);
        if let Err(e) = save(&self.path, &map) {
            warn!(path = %self.path.display(), err = %e, "failed to persist session");
        }
    }
}

impl StorageBackend for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.load().remove(key)
    }

    fn set_all(&self, entries: &[(&str, &str)]) {
        self.modify(|map| {
            for (k, v) in entries {
                map.insert((*k).to_owned(), (*v).to_owned());
            }
        });
    }

    fn remove_all(&self, keys: &[&str]) {
        self.modify(|map| {
            for k in keys {
                map.remove(*k);
            }
        });
    }
}

/// Save the map atomically.
///
/// Uses a unique temp filename (PID + counter) so concurrent writers never
/// share a `.tmp` file.
fn save(path: &Path, map: &HashMap<String, String>) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let json = serde_json::to_string_pretty(map)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Resolve the state directory for persisted session data.
///
/// Checks the explicit override, then `$XDG_STATE_HOME/ballot`, then
/// `$HOME/.local/state/ballot`. `None` means no persistent storage exists.
pub fn state_dir(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = explicit {
        return Some(dir.to_path_buf());
    }
    if let Some(xdg) = std::env::var_os("XDG_STATE_HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(xdg).join("ballot"));
    }
    if let Some(home) = std::env::var_os("HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(home).join(".local/state/ballot"));
    }
    None
}

/// Pick the storage backend for this process.
pub fn select(explicit_dir: Option<&Path>, ephemeral: bool) -> Arc<dyn StorageBackend> {
    if ephemeral {
        debug!("ephemeral session storage");
        return Arc::new(NullStorage);
    }
    match state_dir(explicit_dir) {
        Some(dir) => Arc::new(FileStorage::in_dir(&dir)),
        None => {
            debug!("no state directory, session will not persist");
            Arc::new(NullStorage)
        }
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
