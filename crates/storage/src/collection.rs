//! A single collection's documents and index metadata.
//!
//! Mirrors the teacher's per-partition shard (`sharded.rs`): one
//! `parking_lot::RwLock` guards one collection's state, so different
//! collections never contend with each other even though each individual
//! collection is single-locked rather than MVCC-versioned.

use docdb_core::{
    CommandError, CommandResult, CreateIndexesResult, IndexMetadata, IndexSpec, ObjectId,
};
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::bson_key::BsonKey;
use docdb_core::{Bson, Document};

/// In-memory state for one namespace: its documents, in first-insert order,
/// plus any indexes declared on it.
pub struct Collection {
    inner: RwLock<Inner>,
}

struct Inner {
    documents: IndexMap<BsonKey, Document>,
    indexes: Vec<IndexMetadata>,
}

impl Default for Collection {
    fn default() -> Self {
        Collection {
            inner: RwLock::new(Inner {
                documents: IndexMap::new(),
                indexes: vec![default_id_index()],
            }),
        }
    }
}

fn default_id_index() -> IndexMetadata {
    IndexMetadata {
        v: 2,
        key: Document::from_pairs([("_id".to_string(), Bson::Int32(1))]),
        name: "_id_".to_string(),
        ns: String::new(),
        unique: Some(true),
        sparse: None,
        partial_filter_expression: None,
        expire_after_seconds: None,
    }
}

impl Collection {
    /// Inserts documents, assigning `_id` with an [`ObjectId`] where absent.
    /// Rejects the whole batch on the first duplicate `_id`.
    pub fn insert(&self, mut docs: Vec<Document>) -> CommandResult<u64> {
        let mut inner = self.inner.write();
        for doc in &mut docs {
            if !doc.contains_key("_id") {
                doc.insert("_id", Bson::ObjectId(ObjectId::new()));
            }
        }
        for doc in &docs {
            let id = doc.get("_id").expect("just inserted above").clone();
            if inner.documents.contains_key(&BsonKey::new(id.clone())) {
                return Err(CommandError::DuplicateKey {
                    reason: format!("duplicate key: _id = {id}"),
                });
            }
        }
        let count = docs.len() as u64;
        for doc in docs {
            let id = doc.get("_id").expect("just inserted above").clone();
            inner.documents.insert(BsonKey::new(id), doc);
        }
        Ok(count)
    }

    /// Returns every document, in insertion order, for the caller to filter.
    pub fn all_documents(&self) -> Vec<Document> {
        self.inner.read().documents.values().cloned().collect()
    }

    /// Builds a collection from already-materialized documents and index
    /// metadata, preserving declared indexes across a transaction snapshot.
    pub fn from_parts(docs: Vec<Document>, indexes: Vec<IndexMetadata>) -> Self {
        let mut documents = IndexMap::new();
        for doc in docs {
            if let Some(id) = doc.get("_id").cloned() {
                documents.insert(BsonKey::new(id), doc);
            }
        }
        Collection {
            inner: RwLock::new(Inner { documents, indexes }),
        }
    }

    /// Raw index metadata, without namespace substitution.
    pub fn indexes_snapshot(&self) -> Vec<IndexMetadata> {
        self.inner.read().indexes.clone()
    }

    /// Removes documents whose `_id` is in `ids`, returning how many were removed.
    pub fn remove_ids(&self, ids: &[Bson]) -> u64 {
        let mut inner = self.inner.write();
        let mut removed = 0;
        for id in ids {
            if inner.documents.shift_remove(&BsonKey::new(id.clone())).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Replaces a document in place, keyed by its (unchanged) `_id`.
    pub fn replace_document(&self, id: &Bson, doc: Document) {
        self.inner.write().documents.insert(BsonKey::new(id.clone()), doc);
    }

    /// Inserts one upserted document and returns its assigned `_id`.
    pub fn upsert_one(&self, mut doc: Document) -> Bson {
        if !doc.contains_key("_id") {
            doc.insert("_id", Bson::ObjectId(ObjectId::new()));
        }
        let id = doc.get("_id").expect("just inserted above").clone();
        self.inner.write().documents.insert(BsonKey::new(id.clone()), doc);
        id
    }

    /// Declares new indexes, skipping any whose key spec already exists.
    /// Returns the before/after index counts.
    pub fn create_indexes(
        &self,
        ns_string: &str,
        specs: Vec<IndexSpec>,
    ) -> CommandResult<CreateIndexesResult> {
        let mut inner = self.inner.write();
        let before = inner.indexes.len() as i32;
        for spec in specs {
            if inner.indexes.iter().any(|existing| existing.key == spec.key) {
                continue;
            }
            let name = spec
                .name
                .unwrap_or_else(|| generate_index_name(&spec.key));
            inner.indexes.push(IndexMetadata {
                v: 2,
                key: spec.key,
                name,
                ns: ns_string.to_string(),
                unique: Some(spec.unique).filter(|u| *u),
                sparse: Some(spec.sparse).filter(|s| *s),
                partial_filter_expression: spec.partial_filter_expression,
                expire_after_seconds: spec.expire_after_seconds,
            });
        }
        let after = inner.indexes.len() as i32;
        Ok(CreateIndexesResult {
            num_indexes_before: before,
            num_indexes_after: after,
        })
    }

    /// Lists all indexes declared on this collection.
    pub fn list_indexes(&self, ns_string: &str) -> Vec<IndexMetadata> {
        self.inner
            .read()
            .indexes
            .iter()
            .cloned()
            .map(|mut idx| {
                if idx.ns.is_empty() {
                    idx.ns = ns_string.to_string();
                }
                idx
            })
            .collect()
    }
}

fn generate_index_name(key: &Document) -> String {
    key.iter()
        .map(|(field, direction)| {
            let dir = direction.as_f64().map(|d| d as i64).unwrap_or(1);
            format!("{field}_{dir}")
        })
        .collect::<Vec<_>>()
        .join("_")
}
