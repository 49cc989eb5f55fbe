// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory refresh-token store.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{StoredRefresh, TokenStore, DEFAULT_STORE_TIMEOUT};
use crate::auth::error::StoreError;

type Entries = HashMap<String, StoredRefresh>;

/// Process-local store. Entries are lost on restart and not shared between
/// instances.
///
/// Only lock acquisition can wait; once a lock is held the change is applied
/// without yielding, so a timed-out call never writes.
pub struct MemoryTokenStore {
    entries: RwLock<Entries>,
    timeout: Duration,
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bound on waiting for the entry lock.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    async fn read(&self) -> Result<RwLockReadGuard<'_, Entries>, StoreError> {
        tokio::time::timeout(self.timeout, self.entries.read())
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))
    }

    async fn write(&self) -> Result<RwLockWriteGuard<'_, Entries>, StoreError> {
        tokio::time::timeout(self.timeout, self.entries.write())
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn put(&self, subject: &str, raw_token: &str, expires_at: i64) -> Result<(), StoreError> {
        let entry = StoredRefresh::new(raw_token, expires_at)?;
        self.write().await?.insert(subject.to_string(), entry);
        Ok(())
    }

    async fn verify(&self, subject: &str, raw_token: &str, now: i64) -> Result<bool, StoreError> {
        let entries = self.read().await?;
        Ok(entries
            .get(subject)
            .is_some_and(|entry| entry.accepts(raw_token, now)))
    }

    async fn invalidate(&self, subject: &str) -> Result<(), StoreError> {
        self.write().await?.remove(subject);
        Ok(())
    }

    async fn purge_expired(&self, now: i64) -> Result<usize, StoreError> {
        let mut entries = self.write().await?;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok(before - entries.len())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const NOW: i64 = 1_700_000_000;

    #[tokio::test]
    async fn verify_without_entry_is_false() {
        let store = MemoryTokenStore::new();
        assert!(!store.verify("u1", "tok", NOW).await.unwrap());
    }

    #[tokio::test]
    async fn put_overwrites_previous_token() {
        let store = MemoryTokenStore::new();
        store.put("u1", "first", NOW + 60).await.unwrap();
        store.put("u1", "second", NOW + 60).await.unwrap();

        assert!(!store.verify("u1", "first", NOW).await.unwrap());
        assert!(store.verify("u1", "second", NOW).await.unwrap());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn invalidate_is_idempotent() {
        let store = MemoryTokenStore::new();
        store.put("u1", "tok", NOW + 60).await.unwrap();
        store.invalidate("u1").await.unwrap();
        store.invalidate("u1").await.unwrap();
        assert!(!store.verify("u1", "tok", NOW).await.unwrap());
    }

    #[tokio::test]
    async fn subjects_are_independent() {
        let store = MemoryTokenStore::new();
        store.put("u1", "tok-1", NOW + 60).await.unwrap();
        store.put("u2", "tok-2", NOW + 60).await.unwrap();
        store.invalidate("u1").await.unwrap();

        assert!(store.verify("u2", "tok-2", NOW).await.unwrap());
        assert!(!store.verify("u2", "tok-1", NOW).await.unwrap());
    }

    #[tokio::test]
    async fn purge_drops_only_expired_entries() {
        let store = MemoryTokenStore::new();
        store.put("old", "a", NOW - 1).await.unwrap();
        store.put("edge", "b", NOW).await.unwrap();
        store.put("live", "c", NOW + 60).await.unwrap();

        assert_eq!(store.purge_expired(NOW).await.unwrap(), 2);
        assert_eq!(store.len().await, 1);
        assert!(store.verify("live", "c", NOW).await.unwrap());
    }

    #[tokio::test]
    async fn held_lock_times_out_without_writing() {
        let store = MemoryTokenStore::new().with_timeout(Duration::from_millis(20));
        store.put("u1", "v1", NOW + 60).await.unwrap();

        let reader = store.entries.read().await;
        let result = store.put("u1", "v2", NOW + 60).await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));
        drop(reader);

        assert!(store.verify("u1", "v1", NOW).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_puts_for_different_subjects_do_not_interfere() {
        let store = Arc::new(MemoryTokenStore::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let subject = format!("u{i}");
                let token = format!("tok-{i}");
                store.put(&subject, &token, NOW + 60).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for i in 0..32 {
            let subject = format!("u{i}");
            assert!(store.verify(&subject, &format!("tok-{i}"), NOW).await.unwrap());
        }
    }
}
