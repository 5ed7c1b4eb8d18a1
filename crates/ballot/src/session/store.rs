// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persisted access/refresh token pair.
//!
//! Sole writer of the two storage keys. Every write bumps a generation
//! counter; conditional writes let a refresh that started before a login or
//! logout detect that it is stale and back off instead of resurrecting tokens.

use std::sync::{Arc, Mutex, PoisonError};

use crate::storage::StorageBackend;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Both tokens and the generation they were read at, taken in one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSnapshot {
    pub generation: u64,
    pub access: Option<String>,
    pub refresh: Option<String>,
}

/// Cheap-to-clone handle onto the shared token store.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn StorageBackend>,
    /// Generation counter; held across the compare and the write.
    generation: Mutex<u64>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { inner: Arc::new(Inner { backend, generation: Mutex::new(0) }) }
    }

    pub fn access_token(&self) -> Option<String> {
        let _generation = self.lock();
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        let _generation = self.lock();
        self.read(REFRESH_TOKEN_KEY)
    }

    /// Read the pair under the writers' lock so it is never torn.
    pub fn snapshot(&self) -> TokenSnapshot {
        let generation = self.lock();
        TokenSnapshot {
            generation: *generation,
            access: self.read(ACCESS_TOKEN_KEY),
            refresh: self.read(REFRESH_TOKEN_KEY),
        }
    }

    /// Current generation; pass to the `*_if` writers.
    pub fn generation(&self) -> u64 {
        *self.lock()
    }

    /// Overwrite both tokens.
    pub fn set_tokens(&self, access: &str, refresh: &str) {
        let mut generation = self.lock();
        self.write_pair(access, refresh);
        *generation += 1;
    }

    /// Remove both tokens.
    pub fn clear(&self) {
        let mut generation = self.lock();
        self.remove_pair();
        *generation += 1;
    }

    /// Overwrite both tokens unless another write happened since `expected`.
    pub fn set_tokens_if(&self, expected: u64, access: &str, refresh: &str) -> bool {
        let mut generation = self.lock();
        if *generation != expected {
            return false;
        }
        self.write_pair(access, refresh);
        *generation += 1;
        true
    }

    /// Remove both tokens unless another write happened since `expected`.
    pub fn clear_if(&self, expected: u64) -> bool {
        let mut generation = self.lock();
        if *generation != expected {
            return false;
        }
        self.remove_pair();
        *generation += 1;
        true
    }

    fn read(&self, key: &str) -> Option<String> {
        self.inner.backend.get(key).filter(|t| !t.is_empty())
    }

    fn write_pair(&self, access: &str, refresh: &str) {
        self.inner.backend.set_all(&[(ACCESS_TOKEN_KEY, access), (REFRESH_TOKEN_KEY, refresh)]);
    }

    fn remove_pair(&self) {
        self.inner.backend.remove_all(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY]);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, u64> {
        self.inner.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").field("generation", &self.generation()).finish()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
