//! The default in-memory [`CommandStore`] implementation (§4.6).
//!
//! Grounded on the teacher's `ShardedStore` (`sharded.rs`): a concurrent map
//! from partition key to partition state, so unrelated collections never
//! contend. Here the partition key is a [`Namespace`] and the partition is a
//! [`Collection`]; there is no WAL or version chain since durability is out
//! of scope.

use dashmap::DashMap;
use docdb_core::{
    Bson, CommandError, CommandResult, CommandStore, CreateIndexesResult, DeleteOp, Document,
    IndexMetadata, IndexSpec, InsertResult, Namespace, TransactionalStore, UpdateOp,
    UpdateResult, UpsertedId,
};

use crate::aggregate;
use crate::collection::Collection;
use crate::filter;
use crate::update;

/// A process-local, in-memory store keyed by namespace.
///
/// Cloning via [`TransactionalStore::snapshot_for_transaction`] deep-copies
/// every collection's documents, giving the snapshot an independent
/// baseline that the coordinator later merges back (§4.5).
#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<Namespace, Collection>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, ns: &Namespace) -> dashmap::mapref::one::Ref<'_, Namespace, Collection> {
        if !self.collections.contains_key(ns) {
            self.collections.entry(ns.clone()).or_default();
        }
        self.collections.get(ns).expect("just inserted above")
    }

    fn existing_collection(
        &self,
        ns: &Namespace,
    ) -> Option<dashmap::mapref::one::Ref<'_, Namespace, Collection>> {
        self.collections.get(ns)
    }
}

impl CommandStore for MemoryStore {
    fn insert(&self, ns: &Namespace, docs: Vec<Document>) -> CommandResult<InsertResult> {
        let inserted_count = self.collection(ns).insert(docs)?;
        Ok(InsertResult { inserted_count })
    }

    fn find(
        &self,
        ns: &Namespace,
        filter: &Document,
        _collation: Option<&Document>,
    ) -> CommandResult<Vec<Document>> {
        let Some(collection) = self.existing_collection(ns) else {
            return Ok(Vec::new());
        };
        Ok(collection
            .all_documents()
            .into_iter()
            .filter(|doc| filter::matches(doc, filter))
            .collect())
    }

    fn aggregate(
        &self,
        ns: &Namespace,
        pipeline: &[Document],
        _collation: Option<&Document>,
    ) -> CommandResult<Vec<Document>> {
        let input = self
            .existing_collection(ns)
            .map(|c| c.all_documents())
            .unwrap_or_default();
        aggregate::run(input, pipeline, |target, docs| {
            let out_ns = Namespace::new(ns.database().to_string(), target.to_string());
            self.collection(&out_ns).insert(docs)?;
            Ok(())
        })
    }

    fn create_indexes(
        &self,
        ns: &Namespace,
        indexes: Vec<IndexSpec>,
    ) -> CommandResult<CreateIndexesResult> {
        self.collection(ns).create_indexes(&ns.as_wire_string(), indexes)
    }

    fn list_indexes(&self, ns: &Namespace) -> CommandResult<Vec<IndexMetadata>> {
        Ok(self.collection(ns).list_indexes(&ns.as_wire_string()))
    }

    fn update(&self, ns: &Namespace, updates: Vec<UpdateOp>) -> CommandResult<UpdateResult> {
        let collection = self.collection(ns);
        let mut result = UpdateResult::default();

        for (idx, op) in updates.into_iter().enumerate() {
            let candidates: Vec<Document> = collection
                .all_documents()
                .into_iter()
                .filter(|doc| filter::matches(doc, &op.filter))
                .collect();

            if candidates.is_empty() {
                if op.upsert {
                    let mut seed = merge_filter_into_update(&op.filter, &op.update);
                    update::apply(&mut seed, &op.update)?;
                    let id = collection.upsert_one(seed);
                    result.upserted.push(UpsertedId { index: idx, id });
                }
                continue;
            }

            let targets = if op.multi {
                candidates
            } else {
                candidates.into_iter().take(1).collect()
            };

            for mut doc in targets {
                result.matched_count += 1;
                let id = doc.get("_id").cloned();
                if update::apply(&mut doc, &op.update)? {
                    result.modified_count += 1;
                }
                if let Some(id) = id {
                    collection.replace_document(&id, doc);
                }
            }
        }

        Ok(result)
    }

    fn delete(&self, ns: &Namespace, deletes: Vec<DeleteOp>) -> CommandResult<u64> {
        let Some(collection) = self.existing_collection(ns) else {
            return Ok(0);
        };
        let mut total = 0;
        for op in deletes {
            let mut matching: Vec<Bson> = collection
                .all_documents()
                .into_iter()
                .filter(|doc| filter::matches(doc, &op.filter))
                .filter_map(|doc| doc.get("_id").cloned())
                .collect();
            if op.limit == 1 {
                matching.truncate(1);
            }
            total += collection.remove_ids(&matching);
        }
        Ok(total)
    }
}

fn merge_filter_into_update(filter: &Document, _update: &Document) -> Document {
    let mut seed = Document::new();
    for (key, value) in filter.iter() {
        let is_scalar = matches!(
            value,
            Bson::String(_) | Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Boolean(_)
        );
        if !key.starts_with('$') && is_scalar {
            seed.insert(key.clone(), value.clone());
        }
    }
    seed
}

impl TransactionalStore for MemoryStore {
    fn snapshot_for_transaction(&self) -> Self {
        let snapshot = MemoryStore::new();
        for entry in self.collections.iter() {
            let ns = entry.key().clone();
            let docs = entry.value().all_documents();
            let indexes = entry.value().indexes_snapshot();
            snapshot.collections.insert(ns, Collection::from_parts(docs, indexes));
        }
        snapshot
    }

    fn publish_transaction_snapshot(
        &self,
        snapshot: Self,
        touched: &std::collections::HashSet<Namespace>,
    ) -> CommandResult<()> {
        for (ns, collection) in snapshot.collections.into_iter() {
            if touched.contains(&ns) {
                self.collections.insert(ns, collection);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns() -> Namespace {
        Namespace::new("test", "users")
    }

    fn doc(pairs: &[(&str, Bson)]) -> Document {
        Document::from_pairs(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())))
    }

    #[test]
    fn insert_then_find_round_trips() {
        let store = MemoryStore::new();
        store
            .insert(&ns(), vec![doc(&[("name", Bson::String("ana".into()))])])
            .unwrap();
        let found = store.find(&ns(), &Document::new(), None).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].contains_key("_id"));
    }

    #[test]
    fn duplicate_id_on_insert_is_rejected() {
        let store = MemoryStore::new();
        let d = doc(&[("_id", Bson::Int32(1))]);
        store.insert(&ns(), vec![d.clone()]).unwrap();
        let err = store.insert(&ns(), vec![d]).unwrap_err();
        assert!(matches!(err, CommandError::DuplicateKey { .. }));
    }

    #[test]
    fn update_with_upsert_inserts_when_nothing_matches() {
        let store = MemoryStore::new();
        let result = store
            .update(
                &ns(),
                vec![UpdateOp {
                    filter: doc(&[("name", Bson::String("new".into()))]),
                    update: Document::from_pairs([(
                        "$set".to_string(),
                        Bson::Document(doc(&[("active", Bson::Boolean(true))])),
                    )]),
                    multi: false,
                    upsert: true,
                    array_filters: vec![],
                }],
            )
            .unwrap();
        assert_eq!(result.upserted.len(), 1);
        let found = store.find(&ns(), &Document::new(), None).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn snapshot_is_independent_of_subsequent_writes() {
        let store = MemoryStore::new();
        store.insert(&ns(), vec![doc(&[("_id", Bson::Int32(1))])]).unwrap();
        let snapshot = store.snapshot_for_transaction();
        store.insert(&ns(), vec![doc(&[("_id", Bson::Int32(2))])]).unwrap();
        assert_eq!(snapshot.find(&ns(), &Document::new(), None).unwrap().len(), 1);
        assert_eq!(store.find(&ns(), &Document::new(), None).unwrap().len(), 2);
    }

    #[test]
    fn publish_only_overwrites_touched_namespaces() {
        let store = MemoryStore::new();
        let other_ns = Namespace::new("test", "other");
        store.insert(&ns(), vec![doc(&[("_id", Bson::Int32(1))])]).unwrap();
        store.insert(&other_ns, vec![doc(&[("_id", Bson::Int32(9))])]).unwrap();

        let snapshot = store.snapshot_for_transaction();
        snapshot.insert(&ns(), vec![doc(&[("_id", Bson::Int32(2))])]).unwrap();

        // Another transaction concurrently writes to `other_ns` after this snapshot was taken.
        store.insert(&other_ns, vec![doc(&[("_id", Bson::Int32(10))])]).unwrap();

        let mut touched = std::collections::HashSet::new();
        touched.insert(ns());
        store.publish_transaction_snapshot(snapshot, &touched).unwrap();

        assert_eq!(store.find(&ns(), &Document::new(), None).unwrap().len(), 2);
        assert_eq!(store.find(&other_ns, &Document::new(), None).unwrap().len(), 2);
    }
}
