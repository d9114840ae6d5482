//! Typed CRUD surface over one namespace (§4.2 "Per-command handlers").
//!
//! Every method here builds exactly one command document and sends it
//! through [`docdb_engine::Dispatcher::dispatch`] — the facade invariant
//! carried over from the teacher's `FacadeImpl`: "every facade call
//! desugars to exactly one substrate call pattern" (`facade/impl_.rs`),
//! generalized here to "exactly one dispatch call".

use std::sync::Arc;

use docdb_core::{Bson, Document};
use docdb_engine::Dispatcher;
use docdb_storage::MemoryStore;

use crate::cursor::Cursor;
use crate::error::Result;
use crate::session::Session;

/// A handle to one `<database>.<collection>` namespace.
#[derive(Clone)]
pub struct Collection {
    dispatcher: Arc<Dispatcher<MemoryStore>>,
    database: String,
    name: String,
}

/// The outcome of `insert_one`/`insert_many`.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertResult {
    /// Number of documents the engine accepted.
    pub inserted_count: i64,
}

/// The outcome of `update_one`/`update_many`/`replace_one`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateResult {
    /// Documents that matched the filter.
    pub matched_count: i64,
    /// Documents actually changed by the update.
    pub modified_count: i64,
    /// `(index, _id)` pairs for documents created by an upsert.
    pub upserted: Vec<(i32, Bson)>,
}

/// `returnDocument`/legacy `new` selection for `find_one_and_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnDocument {
    /// Return the document as it looked before the modification.
    Before,
    /// Return the document as it looks after the modification.
    After,
}

impl ReturnDocument {
    fn as_wire_str(self) -> &'static str {
        match self {
            ReturnDocument::Before => "before",
            ReturnDocument::After => "after",
        }
    }
}

/// One operation within a `bulk_write` batch, mirroring the driver-style
/// `insertOne`/`updateOne`/… op documents `handlers::bulk` consumes.
pub enum WriteModel {
    /// Insert a single document.
    InsertOne(Document),
    /// Update the first matching document.
    UpdateOne { filter: Document, update: Document, upsert: bool },
    /// Update every matching document.
    UpdateMany { filter: Document, update: Document, upsert: bool },
    /// Replace the first matching document.
    ReplaceOne { filter: Document, replacement: Document, upsert: bool },
    /// Delete the first matching document.
    DeleteOne(Document),
    /// Delete every matching document.
    DeleteMany(Document),
}

impl WriteModel {
    fn into_op_document(self) -> Document {
        let (kind, body) = match self {
            WriteModel::InsertOne(document) => {
                let mut body = Document::new();
                body.insert("document", Bson::Document(document));
                ("insertOne", body)
            }
            WriteModel::UpdateOne { filter, update, upsert } => {
                let mut body = Document::new();
                body.insert("filter", Bson::Document(filter));
                body.insert("update", Bson::Document(update));
                body.insert("upsert", Bson::Boolean(upsert));
                ("updateOne", body)
            }
            WriteModel::UpdateMany { filter, update, upsert } => {
                let mut body = Document::new();
                body.insert("filter", Bson::Document(filter));
                body.insert("update", Bson::Document(update));
                body.insert("upsert", Bson::Boolean(upsert));
                ("updateMany", body)
            }
            WriteModel::ReplaceOne { filter, replacement, upsert } => {
                let mut body = Document::new();
                body.insert("filter", Bson::Document(filter));
                body.insert("replacement", Bson::Document(replacement));
                body.insert("upsert", Bson::Boolean(upsert));
                ("replaceOne", body)
            }
            WriteModel::DeleteOne(filter) => {
                let mut body = Document::new();
                body.insert("filter", Bson::Document(filter));
                ("deleteOne", body)
            }
            WriteModel::DeleteMany(filter) => {
                let mut body = Document::new();
                body.insert("filter", Bson::Document(filter));
                ("deleteMany", body)
            }
        };
        let mut op = Document::new();
        op.insert(kind, Bson::Document(body));
        op
    }
}

/// The outcome of `bulk_write`.
#[derive(Debug, Clone, Default)]
pub struct BulkWriteResult {
    /// Documents inserted.
    pub inserted_count: i64,
    /// Documents matched by update/replace filters.
    pub matched_count: i64,
    /// Documents changed by update/replace.
    pub modified_count: i64,
    /// Documents removed.
    pub deleted_count: i64,
    /// Documents created by upserts.
    pub upserted_count: i64,
    /// The index of the first failed operation and its engine error, if any
    /// op failed — `bulkWrite` stops at the first failure (§4.2 "BulkWrite ordering").
    pub write_error: Option<(i32, crate::error::Error)>,
}

impl Collection {
    pub(crate) fn new(dispatcher: Arc<Dispatcher<MemoryStore>>, database: String, name: String) -> Self {
        Collection { dispatcher, database, name }
    }

    /// The collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, cmd: Document) -> Result<Document> {
        crate::error::check(self.dispatcher.dispatch(&cmd))
    }

    fn run_in_session(&self, mut cmd: Document, session: &mut Session) -> Result<Document> {
        session.attach(&mut cmd);
        crate::error::check(self.dispatcher.dispatch(&cmd))
    }

    fn base_command(&self, command: &str) -> Document {
        let mut cmd = Document::new();
        cmd.insert(command, Bson::String(self.name.clone()));
        cmd.insert("$db", Bson::String(self.database.clone()));
        cmd
    }

    /// Inserts a single document.
    pub fn insert_one(&self, document: Document) -> Result<InsertResult> {
        self.insert_many(vec![document])
    }

    /// Inserts many documents in one call.
    pub fn insert_many(&self, documents: Vec<Document>) -> Result<InsertResult> {
        let mut cmd = self.base_command("insert");
        cmd.insert("documents", Bson::Array(documents.into_iter().map(Bson::Document).collect()));
        let resp = self.run(cmd)?;
        Ok(InsertResult { inserted_count: read_i64(&resp, "n") })
    }

    /// Inserts many documents as part of an open transaction.
    pub fn insert_many_in_session(&self, documents: Vec<Document>, session: &mut Session) -> Result<InsertResult> {
        let mut cmd = self.base_command("insert");
        cmd.insert("documents", Bson::Array(documents.into_iter().map(Bson::Document).collect()));
        let resp = self.run_in_session(cmd, session)?;
        Ok(InsertResult { inserted_count: read_i64(&resp, "n") })
    }

    /// Finds every document matching `filter`, returning a lazily-fetched cursor.
    pub fn find(&self, filter: Document) -> Result<Cursor> {
        let mut cmd = self.base_command("find");
        cmd.insert("filter", Bson::Document(filter));
        let resp = self.dispatcher.dispatch(&cmd);
        Cursor::from_response(Arc::clone(&self.dispatcher), self.name.clone(), resp)
    }

    /// Finds every document matching `filter`, batching no more than
    /// `batch_size` per round trip.
    pub fn find_with_batch_size(&self, filter: Document, batch_size: usize) -> Result<Cursor> {
        let mut cmd = self.base_command("find");
        cmd.insert("filter", Bson::Document(filter));
        cmd.insert("batchSize", Bson::Int64(batch_size as i64));
        let resp = self.dispatcher.dispatch(&cmd);
        Cursor::from_response(Arc::clone(&self.dispatcher), self.name.clone(), resp)
    }

    /// Finds the first document matching `filter`, if any.
    pub fn find_one(&self, filter: Document) -> Result<Option<Document>> {
        let mut cmd = self.base_command("find");
        cmd.insert("filter", Bson::Document(filter));
        cmd.insert("limit", Bson::Int64(1));
        let resp = self.run(cmd)?;
        let batch = resp
            .get("cursor")
            .and_then(Bson::as_document)
            .and_then(|c| c.get("firstBatch"))
            .and_then(Bson::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(batch.into_iter().next().and_then(|v| v.as_document().cloned()))
    }

    /// Counts documents matching `filter`.
    pub fn count_documents(&self, filter: Document) -> Result<i64> {
        let mut cmd = self.base_command("countDocuments");
        cmd.insert("query", Bson::Document(filter));
        let resp = self.run(cmd)?;
        Ok(read_i64(&resp, "n"))
    }

    /// Distinct values of `key` across documents matching `filter`.
    pub fn distinct(&self, key: impl Into<String>, filter: Document) -> Result<Vec<Bson>> {
        let mut cmd = self.base_command("distinct");
        cmd.insert("key", Bson::String(key.into()));
        cmd.insert("query", Bson::Document(filter));
        let resp = self.run(cmd)?;
        Ok(resp.get("values").and_then(Bson::as_array).cloned().unwrap_or_default())
    }

    /// Updates the first document matching `filter`.
    pub fn update_one(&self, filter: Document, update: Document, upsert: bool) -> Result<UpdateResult> {
        self.run_update(filter, update, false, upsert)
    }

    /// Updates every document matching `filter`.
    pub fn update_many(&self, filter: Document, update: Document, upsert: bool) -> Result<UpdateResult> {
        self.run_update(filter, update, true, upsert)
    }

    fn run_update(&self, filter: Document, update: Document, multi: bool, upsert: bool) -> Result<UpdateResult> {
        let mut entry = Document::new();
        entry.insert("q", Bson::Document(filter));
        entry.insert("u", Bson::Document(update));
        entry.insert("multi", Bson::Boolean(multi));
        entry.insert("upsert", Bson::Boolean(upsert));

        let mut cmd = self.base_command("update");
        cmd.insert("updates", Bson::Array(vec![Bson::Document(entry)]));
        let resp = self.run(cmd)?;
        Ok(parse_update_result(&resp))
    }

    /// Replaces the first document matching `filter` with `replacement`.
    pub fn replace_one(&self, filter: Document, replacement: Document, upsert: bool) -> Result<UpdateResult> {
        let mut cmd = self.base_command("replaceOne");
        cmd.insert("filter", Bson::Document(filter));
        cmd.insert("replacement", Bson::Document(replacement));
        cmd.insert("upsert", Bson::Boolean(upsert));
        let resp = self.run(cmd)?;
        Ok(parse_update_result(&resp))
    }

    /// Deletes the first document matching `filter`.
    pub fn delete_one(&self, filter: Document) -> Result<i64> {
        self.run_delete(filter, 1)
    }

    /// Deletes every document matching `filter`.
    pub fn delete_many(&self, filter: Document) -> Result<i64> {
        self.run_delete(filter, 0)
    }

    /// Deletes every document matching `filter` as part of an open transaction.
    pub fn delete_many_in_session(&self, filter: Document, session: &mut Session) -> Result<i64> {
        let mut entry = Document::new();
        entry.insert("q", Bson::Document(filter));
        entry.insert("limit", Bson::Int32(0));
        let mut cmd = self.base_command("delete");
        cmd.insert("deletes", Bson::Array(vec![Bson::Document(entry)]));
        let resp = self.run_in_session(cmd, session)?;
        Ok(read_i64(&resp, "n"))
    }

    fn run_delete(&self, filter: Document, limit: i32) -> Result<i64> {
        let mut entry = Document::new();
        entry.insert("q", Bson::Document(filter));
        entry.insert("limit", Bson::Int32(limit));
        let mut cmd = self.base_command("delete");
        cmd.insert("deletes", Bson::Array(vec![Bson::Document(entry)]));
        let resp = self.run(cmd)?;
        Ok(read_i64(&resp, "n"))
    }

    /// Atomically updates the first document matching `filter` and returns
    /// it before or after the update, per `return_document`.
    pub fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
        return_document: ReturnDocument,
        upsert: bool,
    ) -> Result<Option<Document>> {
        let mut cmd = self.base_command("findOneAndUpdate");
        cmd.insert("filter", Bson::Document(filter));
        cmd.insert("update", Bson::Document(update));
        cmd.insert("returnDocument", Bson::String(return_document.as_wire_str().to_string()));
        cmd.insert("upsert", Bson::Boolean(upsert));
        let resp = self.run(cmd)?;
        Ok(resp.get("value").and_then(Bson::as_document).cloned())
    }

    /// Atomically replaces the first document matching `filter`.
    pub fn find_one_and_replace(
        &self,
        filter: Document,
        replacement: Document,
        return_document: ReturnDocument,
        upsert: bool,
    ) -> Result<Option<Document>> {
        let mut cmd = self.base_command("findOneAndReplace");
        cmd.insert("filter", Bson::Document(filter));
        cmd.insert("replacement", Bson::Document(replacement));
        cmd.insert("returnDocument", Bson::String(return_document.as_wire_str().to_string()));
        cmd.insert("upsert", Bson::Boolean(upsert));
        let resp = self.run(cmd)?;
        Ok(resp.get("value").and_then(Bson::as_document).cloned())
    }

    /// Atomically removes the first document matching `filter`, returning it.
    pub fn find_one_and_delete(&self, filter: Document) -> Result<Option<Document>> {
        let mut cmd = self.base_command("findOneAndDelete");
        cmd.insert("filter", Bson::Document(filter));
        let resp = self.run(cmd)?;
        Ok(resp.get("value").and_then(Bson::as_document).cloned())
    }

    /// Runs `models` as one ordered `bulkWrite` batch. Stops at the first
    /// failure (§4.2 "BulkWrite ordering"); everything before it still applied.
    pub fn bulk_write(&self, models: Vec<WriteModel>) -> Result<BulkWriteResult> {
        let mut cmd = self.base_command("bulkWrite");
        cmd.insert(
            "ops",
            Bson::Array(models.into_iter().map(|m| Bson::Document(m.into_op_document())).collect()),
        );
        let resp = self.run(cmd)?;

        let mut result = BulkWriteResult {
            inserted_count: read_i64(&resp, "nInserted"),
            matched_count: read_i64(&resp, "nMatched"),
            modified_count: read_i64(&resp, "nModified"),
            deleted_count: read_i64(&resp, "nDeleted"),
            upserted_count: read_i64(&resp, "nUpserted"),
            write_error: None,
        };
        if let Some(errors) = resp.get("writeErrors").and_then(Bson::as_array) {
            if let Some(first) = errors.first().and_then(Bson::as_document) {
                let index = match first.get("index") {
                    Some(Bson::Int32(n)) => *n,
                    _ => -1,
                };
                let err = crate::error::Error {
                    code: match first.get("code") {
                        Some(Bson::Int32(n)) => *n,
                        _ => 0,
                    },
                    code_name: match first.get("codeName") {
                        Some(Bson::String(s)) => s.clone(),
                        _ => String::new(),
                    },
                    message: match first.get("errmsg") {
                        Some(Bson::String(s)) => s.clone(),
                        _ => String::new(),
                    },
                    labels: Vec::new(),
                };
                result.write_error = Some((index, err));
            }
        }
        Ok(result)
    }

    /// Creates the given index specifications.
    pub fn create_indexes(&self, indexes: Vec<Document>) -> Result<()> {
        let mut cmd = self.base_command("createIndexes");
        cmd.insert("indexes", Bson::Array(indexes.into_iter().map(Bson::Document).collect()));
        self.run(cmd).map(|_| ())
    }

    /// Lists this collection's index metadata documents.
    pub fn list_indexes(&self) -> Result<Vec<Document>> {
        let cmd = self.base_command("listIndexes");
        let resp = self.run(cmd)?;
        let batch = resp
            .get("cursor")
            .and_then(Bson::as_document)
            .and_then(|c| c.get("firstBatch"))
            .and_then(Bson::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(batch.into_iter().filter_map(|v| v.as_document().cloned()).collect())
    }

    /// Runs an aggregation pipeline, returning a lazily-fetched cursor.
    pub fn aggregate(&self, pipeline: Vec<Document>) -> Result<Cursor> {
        let mut cmd = self.base_command("aggregate");
        cmd.insert("pipeline", Bson::Array(pipeline.into_iter().map(Bson::Document).collect()));
        let resp = self.dispatcher.dispatch(&cmd);
        Cursor::from_response(Arc::clone(&self.dispatcher), self.name.clone(), resp)
    }
}

fn read_i64(doc: &Document, field: &str) -> i64 {
    match doc.get(field) {
        Some(Bson::Int64(n)) => *n,
        Some(Bson::Int32(n)) => *n as i64,
        _ => 0,
    }
}

fn parse_update_result(resp: &Document) -> UpdateResult {
    let upserted = resp
        .get("upserted")
        .and_then(Bson::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Bson::as_document)
                .map(|entry| {
                    let index = match entry.get("index") {
                        Some(Bson::Int32(n)) => *n,
                        _ => -1,
                    };
                    let id = entry.get("_id").cloned().unwrap_or(Bson::Null);
                    (index, id)
                })
                .collect()
        })
        .unwrap_or_default();
    UpdateResult {
        matched_count: read_i64(resp, "n"),
        modified_count: read_i64(resp, "nModified"),
        upserted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docdb_engine::DatabaseConfig;

    fn collection() -> Collection {
        Collection::new(Arc::new(Dispatcher::new(DatabaseConfig::default())), "test".into(), "widgets".into())
    }

    #[test]
    fn insert_then_find_one_round_trips() {
        let coll = collection();
        let mut doc = Document::new();
        doc.insert("_id", Bson::Int32(1));
        doc.insert("name", Bson::String("sprocket".into()));
        let result = coll.insert_one(doc).unwrap();
        assert_eq!(result.inserted_count, 1);

        let mut filter = Document::new();
        filter.insert("_id", Bson::Int32(1));
        let found = coll.find_one(filter).unwrap().unwrap();
        assert_eq!(found.get("name"), Some(&Bson::String("sprocket".into())));
    }

    #[test]
    fn cursor_iterates_every_inserted_document() {
        let coll = collection();
        let docs = (0..5)
            .map(|i| Document::from_pairs([("_id".to_string(), Bson::Int32(i))]))
            .collect();
        coll.insert_many(docs).unwrap();

        let cursor = coll.find_with_batch_size(Document::new(), 2).unwrap();
        let collected: Vec<_> = cursor.collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(collected.len(), 5);
    }

    #[test]
    fn bulk_write_stops_at_first_duplicate_key() {
        let coll = collection();
        let mut a = Document::new();
        a.insert("_id", Bson::Int32(1));
        let mut b = Document::new();
        b.insert("_id", Bson::Int32(1));
        let mut c = Document::new();
        c.insert("_id", Bson::Int32(2));

        let result = coll
            .bulk_write(vec![WriteModel::InsertOne(a), WriteModel::InsertOne(b), WriteModel::InsertOne(c)])
            .unwrap();
        assert_eq!(result.inserted_count, 1);
        let (index, err) = result.write_error.unwrap();
        assert_eq!(index, 1);
        assert_eq!(err.code, 11000);
    }

    #[test]
    fn transaction_abort_leaves_no_trace() {
        let coll = collection();
        let db = database_for_test(&coll);
        let mut session = db.start_session();
        session.start_transaction();
        coll.insert_many_in_session(vec![Document::from_pairs([("_id".to_string(), Bson::Int32(9))])], &mut session)
            .unwrap();
        session.abort_transaction().unwrap();

        let found = coll.find_one(Document::from_pairs([("_id".to_string(), Bson::Int32(9))])).unwrap();
        assert!(found.is_none());
    }

    // A `Collection` doesn't expose its dispatcher, so transaction tests
    // need a `Database` built from the same one.
    fn database_for_test(coll: &Collection) -> crate::database::Database {
        crate::database::Database::new(Arc::clone(&coll.dispatcher), coll.database.clone())
    }
}
