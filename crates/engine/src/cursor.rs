//! Cursor registry (§3 "Cursor", §5 "Concurrency & Resource Model").
//!
//! A single `parking_lot::Mutex` guards every open cursor, the same "one
//! lock, simple rules" shape the teacher uses for its transaction pool
//! (`transaction/pool.rs`) rather than a lock-free map: cursor churn is low
//! relative to per-document operation throughput, so contention here isn't
//! the bottleneck worth optimizing.

use std::collections::{HashMap, VecDeque};

use docdb_core::{CommandError, CommandResult, Document, Namespace};
use parking_lot::Mutex;

struct OpenCursor {
    ns: Namespace,
    remaining: VecDeque<Document>,
}

struct Inner {
    cursors: HashMap<i64, OpenCursor>,
    next_id: i64,
}

/// Tracks cursors opened by `find`/`aggregate` until they're drained or killed.
///
/// `cursorId == 0` always means "exhausted" (§3) — callers never see it
/// allocated to an open cursor.
pub struct CursorRegistry {
    inner: Mutex<Inner>,
}

impl Default for CursorRegistry {
    fn default() -> Self {
        CursorRegistry {
            inner: Mutex::new(Inner {
                cursors: HashMap::new(),
                next_id: 1,
            }),
        }
    }
}

impl CursorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `docs` under `ns`, returning the first batch (up to
    /// `batch_size` documents) and the cursor id covering the rest. If
    /// everything fit in the first batch, the cursor id is `0` and nothing
    /// is retained (§8 invariant 3 "cursor drain").
    pub fn open(&self, ns: Namespace, mut docs: VecDeque<Document>, batch_size: usize) -> (i64, Vec<Document>) {
        let batch_size = batch_size.max(1);
        let first_batch: Vec<Document> = docs.drain(..docs.len().min(batch_size)).collect();
        if docs.is_empty() {
            return (0, first_batch);
        }
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id = inner.next_id.wrapping_add(1).max(1);
        inner.cursors.insert(id, OpenCursor { ns, remaining: docs });
        (id, first_batch)
    }

    /// Returns the next batch for `cursor_id`, bound to `ns`. The cursor is
    /// removed once drained. Fails with `CursorNotFound` if the id is unknown
    /// or was opened against a different namespace (§3 cursor invariant).
    pub fn get_more(&self, ns: &Namespace, cursor_id: i64, batch_size: usize) -> CommandResult<(i64, Vec<Document>)> {
        let batch_size = batch_size.max(1);
        let mut inner = self.inner.lock();
        let cursor = inner
            .cursors
            .get_mut(&cursor_id)
            .ok_or(CommandError::CursorNotFound { cursor_id })?;
        if &cursor.ns != ns {
            return Err(CommandError::CursorNotFound { cursor_id });
        }
        let batch: Vec<Document> = cursor.remaining.drain(..cursor.remaining.len().min(batch_size)).collect();
        let exhausted = cursor.remaining.is_empty();
        if exhausted {
            inner.cursors.remove(&cursor_id);
            Ok((0, batch))
        } else {
            Ok((cursor_id, batch))
        }
    }

    /// Kills the given cursor ids, partitioning them into `(killed, not_found)`
    /// (§8 invariant 4).
    pub fn kill(&self, ids: &[i64]) -> (Vec<i64>, Vec<i64>) {
        let mut inner = self.inner.lock();
        let mut killed = Vec::new();
        let mut not_found = Vec::new();
        for &id in ids {
            if inner.cursors.remove(&id).is_some() {
                killed.push(id);
            } else {
                not_found.push(id);
            }
        }
        (killed, not_found)
    }

    /// Number of currently open cursors, exposed for tests and diagnostics.
    pub fn open_count(&self) -> usize {
        self.inner.lock().cursors.len()
    }
}
