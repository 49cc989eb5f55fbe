// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Refresh-Token Store
//!
//! Holds, per subject, a salted digest of the one refresh token that is
//! currently valid for it.
//!
//! ## Semantics
//!
//! - `put` overwrites: issuing a new refresh token silently retires the old one
//! - `verify` is `false` when no entry exists, the entry has expired, or the
//!   presented token does not match
//! - `invalidate` removes the entry and is idempotent
//! - Every call is bounded by the store's own timeout. A call that reports
//!   [`StoreError::Timeout`] has changed nothing
//!
//! ## Backends
//!
//! - [`MemoryTokenStore`] - process-local; tests and single-instance only
//! - [`RedbTokenStore`] - durable file-backed store for a single node
//!
//! Clustered deployments need a shared backend implementing [`TokenStore`].

pub mod digest;
pub mod durable;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::StoreError;

pub use durable::RedbTokenStore;
pub use memory::MemoryTokenStore;

/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// One stored refresh credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRefresh {
    /// Salted digest (see [`digest`])
    pub digest: String,
    /// Refresh token expiry (Unix seconds)
    pub expires_at: i64,
}

impl StoredRefresh {
    pub fn new(raw_token: &str, expires_at: i64) -> Result<Self, StoreError> {
        Ok(Self {
            digest: digest::digest(raw_token)?,
            expires_at,
        })
    }

    /// Whether `raw_token` is this credential and it is still live at `now`.
    pub fn accepts(&self, raw_token: &str, now: i64) -> bool {
        now < self.expires_at && digest::matches(&self.digest, raw_token)
    }
}

/// Per-subject refresh credential storage.
///
/// Implementations bound each call themselves. A write either lands and
/// reports success, or reports an error and leaves the prior entry intact;
/// callers must not wrap calls in their own timeout, since abandoning the
/// future cannot stop a write that is already under way.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Store the digest of `raw_token` for `subject`, replacing any prior entry.
    async fn put(&self, subject: &str, raw_token: &str, expires_at: i64) -> Result<(), StoreError>;

    /// Check `raw_token` against the entry for `subject`.
    async fn verify(&self, subject: &str, raw_token: &str, now: i64) -> Result<bool, StoreError>;

    /// Remove the entry for `subject`, if any.
    async fn invalidate(&self, subject: &str) -> Result<(), StoreError>;

    /// Drop every entry that has expired at `now`; returns how many were removed.
    async fn purge_expired(&self, now: i64) -> Result<usize, StoreError>;

    /// Backend name for health reporting.
    fn backend(&self) -> &'static str;
}
