// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::*;
use crate::storage::{MemoryStorage, NullStorage};

fn memory_store() -> (SessionStore, Arc<MemoryStorage>) {
    let backend = Arc::new(MemoryStorage::new());
    (SessionStore::new(backend.clone()), backend)
}

#[test]
fn set_tokens_writes_both_keys() {
    let (store, backend) = memory_store();
    store.set_tokens("A", "R");
    assert_eq!(store.access_token().as_deref(), Some("A"));
    assert_eq!(store.refresh_token().as_deref(), Some("R"));
    assert_eq!(backend.get(ACCESS_TOKEN_KEY).as_deref(), Some("A"));
    assert_eq!(backend.get(REFRESH_TOKEN_KEY).as_deref(), Some("R"));
}

#[test]
fn clear_removes_both_keys() {
    let (store, backend) = memory_store();
    store.set_tokens("A", "R");
    store.clear();
    assert_eq!(store.access_token(), None);
    assert_eq!(store.refresh_token(), None);
    assert_eq!(backend.get(ACCESS_TOKEN_KEY), None);
    assert_eq!(backend.get(REFRESH_TOKEN_KEY), None);
}

#[test]
fn empty_values_read_as_absent() {
    let (store, _backend) = memory_store();
    store.set_tokens("", "");
    assert_eq!(store.access_token(), None);
    assert_eq!(store.refresh_token(), None);
}

#[test]
fn every_write_bumps_generation() {
    let (store, _backend) = memory_store();
    assert_eq!(store.generation(), 0);
    store.set_tokens("A", "R");
    assert_eq!(store.generation(), 1);
    store.clear();
    assert_eq!(store.generation(), 2);
}

#[test]
fn conditional_set_rejects_stale_generation() {
    let (store, _backend) = memory_store();
    store.set_tokens("A", "R");
    let seen = store.generation();

    // A logout lands first.
    store.clear();

    assert!(!store.set_tokens_if(seen, "A2", "R2"));
    assert_eq!(store.access_token(), None);
    assert_eq!(store.refresh_token(), None);
}

#[test]
fn conditional_set_applies_on_current_generation() {
    let (store, _backend) = memory_store();
    store.set_tokens("A", "R");
    let seen = store.generation();
    assert!(store.set_tokens_if(seen, "A2", "R2"));
    assert_eq!(store.access_token().as_deref(), Some("A2"));
    assert_eq!(store.generation(), seen + 1);
}

#[test]
fn conditional_clear_spares_newer_login() {
    let (store, _backend) = memory_store();
    store.set_tokens("A", "R");
    let seen = store.generation();
    store.set_tokens("fresh", "fresh-refresh");

    assert!(!store.clear_if(seen));
    assert_eq!(store.access_token().as_deref(), Some("fresh"));
}

#[test]
fn null_backend_never_panics() {
    let store = SessionStore::new(Arc::new(NullStorage));
    store.set_tokens("A", "R");
    assert_eq!(store.access_token(), None);
    store.clear();
    assert_eq!(store.refresh_token(), None);
}

#[test]
fn clones_share_state() {
    let (store, _backend) = memory_store();
    let other = store.clone();
    store.set_tokens("A", "R");
    assert_eq!(other.access_token().as_deref(), Some("A"));
    assert_eq!(other.generation(), store.generation());
}

#[test]
fn snapshot_reports_pair_and_generation() {
    let (store, _backend) = memory_store();
    store.set_tokens("A", "");
    let snapshot = store.snapshot();
    assert_eq!(snapshot.generation, 1);
    assert_eq!(snapshot.access.as_deref(), Some("A"));
    assert_eq!(snapshot.refresh, None);
}

#[test]
fn snapshot_never_sees_a_torn_pair() {
    let (store, _backend) = memory_store();
    store.set_tokens("a0", "r0");
    let stop = Arc::new(AtomicBool::new(false));

    let writer = {
        let store = store.clone();
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || {
            let mut i = 0u64;
            while !stop.load(Ordering::Relaxed) {
                i += 1;
                store.set_tokens(&format!("a{i}"), &format!("r{i}"));
            }
        })
    };

    let mut torn = 0;
    for _ in 0..20_000 {
        let snapshot = store.snapshot();
        let access = snapshot.access.unwrap_or_default();
        let refresh = snapshot.refresh.unwrap_or_default();
        if access.trim_start_matches('a') != refresh.trim_start_matches('r') {
            torn += 1;
        }
    }
    stop.store(true, Ordering::Relaxed);
    let _ = writer.join();

    assert_eq!(torn, 0);
}
