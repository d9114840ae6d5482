//! A [`CommandStore`] wrapper that records which namespaces a transaction
//! actually writes to (§4.5, §9 Open Questions).
//!
//! Grounded on the teacher's per-branch commit lock in
//! `concurrency/manager.rs`, simplified from per-key read/write sets down to
//! per-namespace tracking since the command layer only needs to know which
//! collections to merge back on commit, not which documents conflicted.

use std::collections::HashSet;

use docdb_core::{
    CommandResult, CommandStore, CreateIndexesResult, DeleteOp, Document, IndexMetadata,
    IndexSpec, InsertResult, Namespace, UpdateOp, UpdateResult,
};
use parking_lot::Mutex;

/// Wraps a transaction's snapshot store, recording every namespace touched
/// by a mutating operation into `touched`.
pub struct TrackedStore<'a, S: CommandStore> {
    inner: &'a S,
    touched: &'a Mutex<HashSet<Namespace>>,
}

impl<'a, S: CommandStore> TrackedStore<'a, S> {
    /// Wraps `inner`, recording touched namespaces into `touched`.
    pub fn new(inner: &'a S, touched: &'a Mutex<HashSet<Namespace>>) -> Self {
        TrackedStore { inner, touched }
    }

    fn mark(&self, ns: &Namespace) {
        self.touched.lock().insert(ns.clone());
    }
}

impl<'a, S: CommandStore> CommandStore for TrackedStore<'a, S> {
    fn insert(&self, ns: &Namespace, docs: Vec<Document>) -> CommandResult<InsertResult> {
        self.mark(ns);
        self.inner.insert(ns, docs)
    }

    fn find(
        &self,
        ns: &Namespace,
        filter: &Document,
        collation: Option<&Document>,
    ) -> CommandResult<Vec<Document>> {
        self.inner.find(ns, filter, collation)
    }

    fn aggregate(
        &self,
        ns: &Namespace,
        pipeline: &[Document],
        collation: Option<&Document>,
    ) -> CommandResult<Vec<Document>> {
        // A pipeline ending in $out/$merge writes into a sibling namespace
        // the store picks; conservatively mark the source touched too.
        self.mark(ns);
        self.inner.aggregate(ns, pipeline, collation)
    }

    fn create_indexes(
        &self,
        ns: &Namespace,
        indexes: Vec<IndexSpec>,
    ) -> CommandResult<CreateIndexesResult> {
        self.mark(ns);
        self.inner.create_indexes(ns, indexes)
    }

    fn list_indexes(&self, ns: &Namespace) -> CommandResult<Vec<IndexMetadata>> {
        self.inner.list_indexes(ns)
    }

    fn update(&self, ns: &Namespace, updates: Vec<UpdateOp>) -> CommandResult<UpdateResult> {
        self.mark(ns);
        self.inner.update(ns, updates)
    }

    fn delete(&self, ns: &Namespace, deletes: Vec<DeleteOp>) -> CommandResult<u64> {
        self.mark(ns);
        self.inner.delete(ns, deletes)
    }
}
