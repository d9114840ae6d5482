//! Session-keyed transaction pool (§4.5 "Transactions").
//!
//! Grounded on the teacher's `Session` (executor's session routing) and
//! `TransactionManager`'s per-partition commit locking (`manager.rs`):
//! one entry per logical session id (`lsid`), holding at most one active
//! transaction, guarded by `DashMap`'s per-shard locking so unrelated
//! sessions never contend.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use docdb_core::{CommandError, CommandResult, ErrorLabel, Namespace, TransactionalStore};
use parking_lot::Mutex;

use crate::tracked_store::TrackedStore;

/// Opaque session identity, as carried on the wire under `lsid.id`.
pub type SessionKey = Vec<u8>;

/// Default transaction idle timeout, mirroring MongoDB's driver default.
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(60);

struct ActiveTransaction<S> {
    txn_number: i64,
    snapshot: S,
    touched: Mutex<HashSet<Namespace>>,
    started_at: Instant,
}

/// Tracks one active transaction per session, keyed by `lsid`.
pub struct SessionPool<S: TransactionalStore> {
    sessions: DashMap<SessionKey, ActiveTransaction<S>>,
    timeout: Duration,
}

impl<S: TransactionalStore> Default for SessionPool<S> {
    fn default() -> Self {
        SessionPool {
            sessions: DashMap::new(),
            timeout: DEFAULT_TRANSACTION_TIMEOUT,
        }
    }
}

impl<S: TransactionalStore> SessionPool<S> {
    /// Creates an empty pool with the default transaction timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pool with a custom transaction idle timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        SessionPool {
            sessions: DashMap::new(),
            timeout,
        }
    }

    /// Starts a new transaction for `lsid`. A prior, still-open transaction
    /// on the same session is implicitly abandoned if `txn_number` is
    /// strictly greater than it (the client moved on); otherwise this call
    /// fails, matching `startTransaction`'s "already in progress" error.
    pub fn start_transaction(&self, lsid: SessionKey, txn_number: i64, base: &S) -> CommandResult<()> {
        if let Some(existing) = self.sessions.get(&lsid) {
            if txn_number <= existing.txn_number {
                return Err(CommandError::TransactionInProgress);
            }
        }
        let snapshot = base.snapshot_for_transaction();
        self.sessions.insert(
            lsid,
            ActiveTransaction {
                txn_number,
                snapshot,
                touched: Mutex::new(HashSet::new()),
                started_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Runs `f` against the active transaction's snapshot store, tracking
    /// any namespaces it writes to. Fails if no transaction is open for
    /// `lsid`, the `txn_number` is stale, or the transaction has expired.
    pub fn with_transaction_store<F, R>(
        &self,
        lsid: &[u8],
        txn_number: i64,
        f: F,
    ) -> CommandResult<R>
    where
        F: FnOnce(&TrackedStore<'_, S>) -> CommandResult<R>,
    {
        let entry = self.sessions.get(lsid).ok_or_else(|| CommandError::NoSuchTransaction {
            reason: "no transaction is active for this session".to_string(),
            label: ErrorLabel::TransientTransactionError,
        })?;
        if entry.txn_number != txn_number {
            return Err(CommandError::NoSuchTransaction {
                reason: format!(
                    "stale txnNumber {txn_number}, active is {}",
                    entry.txn_number
                ),
                label: ErrorLabel::TransientTransactionError,
            });
        }
        if entry.started_at.elapsed() > self.timeout {
            return Err(CommandError::NoSuchTransaction {
                reason: "transaction exceeded its idle timeout".to_string(),
                label: ErrorLabel::TransientTransactionError,
            });
        }
        let tracked = TrackedStore::new(&entry.snapshot, &entry.touched);
        f(&tracked)
    }

    /// Commits the active transaction for `lsid`, publishing its touched
    /// namespaces back into `base`. Succeeds idempotently if the session has
    /// no active transaction but was just committed by a concurrent retry of
    /// the *same* `txn_number` — callers that need strict re-commit errors
    /// should track that at the dispatcher layer (§4.5 "Idempotent commit").
    pub fn commit_transaction(&self, lsid: &[u8], txn_number: i64, base: &S) -> CommandResult<()> {
        let (_, txn) = self
            .sessions
            .remove_if(lsid, |_, txn| txn.txn_number == txn_number)
            .ok_or_else(|| CommandError::NoSuchTransaction {
                reason: "no matching transaction to commit".to_string(),
                label: ErrorLabel::TransientTransactionError,
            })?;
        let touched = txn.touched.into_inner();
        base.publish_transaction_snapshot(txn.snapshot, &touched)
    }

    /// Aborts (discards) the active transaction for `lsid` without publishing it.
    pub fn abort_transaction(&self, lsid: &[u8], txn_number: i64) -> CommandResult<()> {
        self.sessions
            .remove_if(lsid, |_, txn| txn.txn_number == txn_number)
            .map(|_| ())
            .ok_or_else(|| CommandError::NoSuchTransaction {
                reason: "no matching transaction to abort".to_string(),
                label: ErrorLabel::TransientTransactionError,
            })
    }

    /// Whether a transaction is currently open for `lsid`.
    pub fn has_active_transaction(&self, lsid: &[u8]) -> bool {
        self.sessions.contains_key(lsid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docdb_core::{Bson, CommandStore, Document};
    use docdb_storage::MemoryStore;
    use proptest::prelude::*;

    fn ns() -> Namespace {
        Namespace::new("test", "widgets")
    }

    #[test]
    fn commit_publishes_only_touched_namespace() {
        let base = MemoryStore::new();
        let other = Namespace::new("test", "other");
        base.insert(&other, vec![Document::from_pairs([(
            "_id".to_string(),
            Bson::Int32(1),
        )])])
        .unwrap();

        let pool: SessionPool<MemoryStore> = SessionPool::new();
        let lsid = vec![1, 2, 3];
        pool.start_transaction(lsid.clone(), 1, &base).unwrap();

        pool.with_transaction_store(&lsid, 1, |store| {
            store.insert(&ns(), vec![Document::from_pairs([(
                "_id".to_string(),
                Bson::Int32(7),
            )])])
        })
        .unwrap();

        // A concurrent write to `other` lands after the snapshot was taken.
        base.insert(&other, vec![Document::from_pairs([(
            "_id".to_string(),
            Bson::Int32(2),
        )])])
        .unwrap();

        pool.commit_transaction(&lsid, 1, &base).unwrap();

        assert_eq!(base.find(&ns(), &Document::new(), None).unwrap().len(), 1);
        assert_eq!(base.find(&other, &Document::new(), None).unwrap().len(), 2);
    }

    #[test]
    fn stale_txn_number_is_rejected() {
        let base = MemoryStore::new();
        let pool: SessionPool<MemoryStore> = SessionPool::new();
        let lsid = vec![9];
        pool.start_transaction(lsid.clone(), 5, &base).unwrap();
        let err = pool.with_transaction_store(&lsid, 4, |_| Ok(())).unwrap_err();
        assert!(matches!(err, CommandError::NoSuchTransaction { .. }));
    }

    #[test]
    fn abort_discards_the_snapshot() {
        let base = MemoryStore::new();
        let pool: SessionPool<MemoryStore> = SessionPool::new();
        let lsid = vec![4];
        pool.start_transaction(lsid.clone(), 1, &base).unwrap();
        pool.with_transaction_store(&lsid, 1, |store| {
            store.insert(&ns(), vec![Document::from_pairs([(
                "_id".to_string(),
                Bson::Int32(1),
            )])])
        })
        .unwrap();
        pool.abort_transaction(&lsid, 1).unwrap();
        assert!(!pool.has_active_transaction(&lsid));
        assert_eq!(base.find(&ns(), &Document::new(), None).unwrap().len(), 0);
    }

    proptest! {
        /// §8 invariant 7: once a session has an active transaction, starting
        /// another with `txnNumber` at or below it always fails.
        #[test]
        fn starting_at_or_below_the_active_txn_number_always_fails(
            started in 1i64..1000,
            delta in 0i64..1000,
        ) {
            let base = MemoryStore::new();
            let pool: SessionPool<MemoryStore> = SessionPool::new();
            let lsid = vec![42];
            pool.start_transaction(lsid.clone(), started, &base).unwrap();

            let retry = started - delta;
            prop_assert!(pool.start_transaction(lsid.clone(), retry, &base).is_err());
        }
    }
}
