//! The engine-facing `CommandStore` interface (§4.6).
//!
//! `CommandStore` is the thin translation boundary between wire documents
//! and a concrete storage engine. Handlers never touch a storage engine's
//! native entities directly — they go through this trait, which keeps the
//! implementation swappable (a sharded or persistent engine could replace
//! `docdb-storage::MemoryStore` without any handler changes).

use crate::error::CommandResult;
use crate::namespace::Namespace;
use crate::value::{Bson, Document};

/// One index creation request (§3 "Index request").
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    /// Index name; auto-generated from `keySpec` if omitted.
    pub name: Option<String>,
    /// Ordered field → direction/type mapping.
    pub key: Document,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
    /// Whether the index omits documents missing the indexed field.
    pub sparse: bool,
    /// Only index documents matching this filter.
    pub partial_filter_expression: Option<Document>,
    /// Collation for string comparisons within this index.
    pub collation: Option<Document>,
    /// TTL, in seconds, after which matching documents expire.
    pub expire_after_seconds: Option<i64>,
}

/// One index's metadata, as returned by `listIndexes` (§6).
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMetadata {
    /// Index format version (always `2`).
    pub v: i32,
    /// The key specification.
    pub key: Document,
    /// The index name.
    pub name: String,
    /// The namespace the index belongs to.
    pub ns: String,
    /// Present and `true` when the index enforces uniqueness.
    pub unique: Option<bool>,
    /// Present and `true` when the index is sparse.
    pub sparse: Option<bool>,
    /// Present when the index is partial.
    pub partial_filter_expression: Option<Document>,
    /// Present when the index is a TTL index.
    pub expire_after_seconds: Option<i64>,
}

/// Result of `createIndexes` (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateIndexesResult {
    /// Number of indexes that existed before this call.
    pub num_indexes_before: i32,
    /// Number of indexes that exist after this call.
    pub num_indexes_after: i32,
}

/// One update operation, as routed to the store by the `Update`/`ReplaceOne`/
/// `FindAndModify` handlers (§4.2, §4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOp {
    /// Selects the documents to update.
    pub filter: Document,
    /// Either an operator-style update document or a replacement document.
    pub update: Document,
    /// Apply to every matching document, not just the first.
    pub multi: bool,
    /// Insert a new document derived from `filter ⊕ update` if nothing matches.
    pub upsert: bool,
    /// Bindings for `$[<id>]` positional identifiers referenced by `update`.
    pub array_filters: Vec<Document>,
}

/// An upserted document's generated identity, reported per update entry.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertedId {
    /// Index of the update request this upsert came from.
    pub index: usize,
    /// The `_id` assigned to the inserted document.
    pub id: Bson,
}

/// Result of `update` (§4.6).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateResult {
    /// Number of documents that matched at least one filter.
    pub matched_count: u64,
    /// Number of documents actually modified.
    pub modified_count: u64,
    /// Identities assigned to any upserted documents.
    pub upserted: Vec<UpsertedId>,
}

/// One delete operation (§4.6). `limit` is `0` (unlimited) or `1` (first match only).
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOp {
    /// Selects the documents to delete.
    pub filter: Document,
    /// `0` deletes every match, `1` deletes at most one.
    pub limit: u32,
}

/// Result of `insert` (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InsertResult {
    /// Number of documents actually inserted.
    pub inserted_count: u64,
}

/// The engine-facing interface every storage backend implements (§4.6).
///
/// Object-safe by construction — the dispatcher holds the "current store"
/// reference (global or per-transaction snapshot) as a `&dyn CommandStore`,
/// passed explicitly to each handler (§5, §9 "Scoped current-store reference").
pub trait CommandStore: Send + Sync {
    /// Inserts documents into a collection. May fail with `DuplicateKey`.
    fn insert(&self, ns: &Namespace, docs: Vec<Document>) -> CommandResult<InsertResult>;

    /// Returns materialized matches for `filter`, in stable engine order.
    fn find(
        &self,
        ns: &Namespace,
        filter: &Document,
        collation: Option<&Document>,
    ) -> CommandResult<Vec<Document>>;

    /// Executes an aggregation pipeline; `$out`/`$merge` are only valid at
    /// the final stage (checked here, at the adapter layer — §9 Open Questions).
    fn aggregate(
        &self,
        ns: &Namespace,
        pipeline: &[Document],
        collation: Option<&Document>,
    ) -> CommandResult<Vec<Document>>;

    /// Creates the given indexes, returning before/after counts.
    fn create_indexes(
        &self,
        ns: &Namespace,
        indexes: Vec<IndexSpec>,
    ) -> CommandResult<CreateIndexesResult>;

    /// Lists all indexes defined on a collection.
    fn list_indexes(&self, ns: &Namespace) -> CommandResult<Vec<IndexMetadata>>;

    /// Applies a batch of update operations.
    fn update(&self, ns: &Namespace, updates: Vec<UpdateOp>) -> CommandResult<UpdateResult>;

    /// Applies a batch of delete operations, returning the total deleted count.
    fn delete(&self, ns: &Namespace, deletes: Vec<DeleteOp>) -> CommandResult<u64>;
}

/// Extension implemented by stores that support transactional snapshot
/// isolation (§4.5, §4.6 `snapshotForTransaction`/`publishTransactionSnapshot`).
///
/// Kept separate from [`CommandStore`] because the snapshot type is
/// concrete (`Self`), which is not object-safe; [`CommandStore`] alone is
/// what handlers and the dispatcher's "current store" reference need, and
/// stays dyn-compatible.
pub trait TransactionalStore: CommandStore + Sized {
    /// Returns an independent, mutable view on a baseline captured at call
    /// time. Must not observe subsequent writes to the original store.
    fn snapshot_for_transaction(&self) -> Self;

    /// Merges `snapshot` back into `self` with the baseline-plus-writes
    /// semantics of §4.5: only the namespaces in `touched` are replaced by
    /// the snapshot's state; every other namespace — including ones written
    /// by other transactions after this one's snapshot was taken — is left
    /// exactly as `self` already has it.
    fn publish_transaction_snapshot(
        &self,
        snapshot: Self,
        touched: &std::collections::HashSet<crate::namespace::Namespace>,
    ) -> CommandResult<()>;
}
