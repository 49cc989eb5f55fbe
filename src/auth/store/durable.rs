// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable refresh-token store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `refresh_tokens`: subject → serialized [`StoredRefresh`] (JSON bytes)
//!
//! redb is synchronous; every operation runs on the blocking pool.
//!
//! ## Timeouts
//!
//! A blocking task cannot be cancelled, so a write that outlives its caller
//! would still commit. Each write therefore checks a `CommitGate` right
//! before committing: if the caller already gave up, the transaction is
//! aborted instead. If the commit started first, the caller waits for its
//! outcome rather than reporting a timeout.

use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};

use super::{StoredRefresh, TokenStore, DEFAULT_STORE_TIMEOUT};
use crate::auth::error::StoreError;

const REFRESH_TOKENS: TableDefinition<&str, &[u8]> = TableDefinition::new("refresh_tokens");

#[derive(Debug, thiserror::Error)]
enum RedbStoreError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("write abandoned by caller")]
    Abandoned,
}

impl From<RedbStoreError> for StoreError {
    fn from(e: RedbStoreError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

type RedbResult<T> = Result<T, RedbStoreError>;

const PENDING: u8 = 0;
const COMMITTING: u8 = 1;
const ABANDONED: u8 = 2;

/// Decides, once, whether a blocking write commits or the caller times out.
#[derive(Default)]
struct CommitGate(AtomicU8);

impl CommitGate {
    /// Claim the right to commit. False once the caller has given up.
    fn begin_commit(&self) -> bool {
        self.0
            .compare_exchange(PENDING, COMMITTING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Give up on the write. False if a commit is already under way.
    fn abandon(&self) -> bool {
        self.0
            .compare_exchange(PENDING, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn is_abandoned(&self) -> bool {
        self.0.load(Ordering::Acquire) == ABANDONED
    }
}

/// Abandons a pending write when the waiting future is dropped early.
struct AbandonOnDrop(Arc<CommitGate>);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.0.abandon();
    }
}

/// Commit `write_txn` unless the caller has given up, in which case abort it.
fn commit_unless_abandoned(write_txn: WriteTransaction, gate: &CommitGate) -> RedbResult<()> {
    if !gate.begin_commit() {
        write_txn.abort()?;
        return Err(RedbStoreError::Abandoned);
    }
    write_txn.commit()?;
    Ok(())
}

/// File-backed store that survives restarts of a single node.
#[derive(Clone)]
pub struct RedbTokenStore {
    db: Arc<Database>,
    timeout: Duration,
}

impl RedbTokenStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::open_inner(path).map_err(Into::into)
    }

    fn open_inner(path: &Path) -> RedbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create the table so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(REFRESH_TOKENS)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(db),
            timeout: DEFAULT_STORE_TIMEOUT,
        })
    }

    /// Set the bound applied to every call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn put_blocking(
        db: &Database,
        gate: &CommitGate,
        subject: &str,
        entry: &StoredRefresh,
    ) -> RedbResult<()> {
        if gate.is_abandoned() {
            return Err(RedbStoreError::Abandoned);
        }
        let json = serde_json::to_vec(entry)?;
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(REFRESH_TOKENS)?;
            table.insert(subject, json.as_slice())?;
        }
        commit_unless_abandoned(write_txn, gate)
    }

    fn get_blocking(db: &Database, subject: &str) -> RedbResult<Option<StoredRefresh>> {
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(REFRESH_TOKENS)?;
        match table.get(subject)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn remove_blocking(db: &Database, gate: &CommitGate, subject: &str) -> RedbResult<()> {
        if gate.is_abandoned() {
            return Err(RedbStoreError::Abandoned);
        }
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(REFRESH_TOKENS)?;
            table.remove(subject)?;
        }
        commit_unless_abandoned(write_txn, gate)
    }

    fn purge_blocking(db: &Database, gate: &CommitGate, now: i64) -> RedbResult<usize> {
        if gate.is_abandoned() {
            return Err(RedbStoreError::Abandoned);
        }
        let mut removed = 0usize;
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(REFRESH_TOKENS)?;
            table.retain(|_, value| {
                // Entries that no longer decode are dropped along with expired ones
                let keep = serde_json::from_slice::<StoredRefresh>(value)
                    .is_ok_and(|entry| entry.expires_at > now);
                if !keep {
                    removed += 1;
                }
                keep
            })?;
        }
        commit_unless_abandoned(write_txn, gate)?;
        Ok(removed)
    }

    /// Run `op` on the blocking pool, bounded by the store timeout.
    async fn blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Database, &CommitGate) -> RedbResult<T> + Send + 'static,
    {
        let db = self.db.clone();
        let gate = Arc::new(CommitGate::default());
        let _guard = AbandonOnDrop(gate.clone());

        let worker_gate = gate.clone();
        let mut task = tokio::task::spawn_blocking(move || op(&db, &worker_gate));
        let joined = match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(joined) => joined,
            Err(_) if gate.abandon() => return Err(StoreError::Timeout(self.timeout)),
            // The commit already started; its outcome is the answer
            Err(_) => task.await,
        };

        joined
            .map_err(|e| StoreError::Backend(format!("store task failed: {e}")))?
            .map_err(Into::into)
    }
}

#[async_trait]
impl TokenStore for RedbTokenStore {
    async fn put(&self, subject: &str, raw_token: &str, expires_at: i64) -> Result<(), StoreError> {
        let entry = StoredRefresh::new(raw_token, expires_at)?;
        let subject = subject.to_string();
        self.blocking(move |db, gate| Self::put_blocking(db, gate, &subject, &entry))
            .await
    }

    async fn verify(&self, subject: &str, raw_token: &str, now: i64) -> Result<bool, StoreError> {
        let subject = subject.to_string();
        let entry = self
            .blocking(move |db, _| Self::get_blocking(db, &subject))
            .await?;
        Ok(entry.is_some_and(|entry| entry.accepts(raw_token, now)))
    }

    async fn invalidate(&self, subject: &str) -> Result<(), StoreError> {
        let subject = subject.to_string();
        self.blocking(move |db, gate| Self::remove_blocking(db, gate, &subject))
            .await
    }

    async fn purge_expired(&self, now: i64) -> Result<usize, StoreError> {
        self.blocking(move |db, gate| Self::purge_blocking(db, gate, now))
            .await
    }

    fn backend(&self) -> &'static str {
        "redb"
    }
}
