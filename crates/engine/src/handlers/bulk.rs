//! `bulkWrite` (§4.2 "BulkWrite ordering").
//!
//! Only `ordered=true` is supported: operations run in the given order, and
//! the first failure appends one `writeErrors` entry and stops the batch —
//! everything before it has already applied and stays applied.

use docdb_core::{Bson, CommandError, CommandResult, CommandStore, DeleteOp, Document, Namespace, UpdateOp};

use crate::options;

use super::HandlerCtx;

struct Tally {
    n_inserted: i64,
    n_matched: i64,
    n_modified: i64,
    n_deleted: i64,
    upserted: Vec<Document>,
}

impl Tally {
    fn new() -> Self {
        Tally { n_inserted: 0, n_matched: 0, n_modified: 0, n_deleted: 0, upserted: Vec::new() }
    }

    fn into_document(self) -> Document {
        let mut doc = Document::new();
        doc.insert("nInserted", Bson::Int64(self.n_inserted));
        doc.insert("nMatched", Bson::Int64(self.n_matched));
        doc.insert("nModified", Bson::Int64(self.n_modified));
        doc.insert("nDeleted", Bson::Int64(self.n_deleted));
        doc.insert("nUpserted", Bson::Int64(self.upserted.len() as i64));
        if !self.upserted.is_empty() {
            doc.insert("upserted", Bson::Array(self.upserted.into_iter().map(Bson::Document).collect()));
        }
        doc
    }
}

fn as_document(value: &Bson) -> CommandResult<&Document> {
    match value {
        Bson::Document(d) => Ok(d),
        other => Err(CommandError::type_mismatch("object", other.type_name())),
    }
}

fn run_one(store: &dyn CommandStore, ns: &Namespace, op: &Document, tally: &mut Tally) -> CommandResult<()> {
    let kind = op
        .first_key()
        .ok_or_else(|| CommandError::bad_value("empty bulk write operation"))?
        .to_string();
    let body = as_document(op.get(&kind).expect("first_key is present"))?;

    match kind.as_str() {
        "insertOne" => {
            let document = as_document(body.get("document").ok_or_else(|| {
                CommandError::bad_value("'document' is required for insertOne")
            })?)?
            .clone();
            let result = store.insert(ns, vec![document])?;
            tally.n_inserted += result.inserted_count as i64;
        }
        "updateOne" | "updateMany" => {
            let filter = as_document(body.get("filter").ok_or_else(|| CommandError::bad_value("'filter' is required"))?)?.clone();
            let update = as_document(body.get("update").ok_or_else(|| CommandError::bad_value("'update' is required"))?)?.clone();
            let upsert = matches!(body.get("upsert"), Some(Bson::Boolean(true)));
            let result = store.update(
                ns,
                vec![UpdateOp {
                    filter,
                    update,
                    multi: kind == "updateMany",
                    upsert,
                    array_filters: Vec::new(),
                }],
            )?;
            tally.n_matched += result.matched_count as i64;
            tally.n_modified += result.modified_count as i64;
            for upserted in result.upserted {
                let mut entry = Document::new();
                entry.insert("index", Bson::Int32(upserted.index as i32));
                entry.insert("_id", upserted.id);
                tally.upserted.push(entry);
            }
        }
        "replaceOne" => {
            let filter = as_document(body.get("filter").ok_or_else(|| CommandError::bad_value("'filter' is required"))?)?.clone();
            let replacement = as_document(body.get("replacement").ok_or_else(|| CommandError::bad_value("'replacement' is required"))?)?.clone();
            let upsert = matches!(body.get("upsert"), Some(Bson::Boolean(true)));
            let result = store.update(
                ns,
                vec![UpdateOp { filter, update: replacement, multi: false, upsert, array_filters: Vec::new() }],
            )?;
            tally.n_matched += result.matched_count as i64;
            tally.n_modified += result.modified_count as i64;
        }
        "deleteOne" | "deleteMany" => {
            let filter = as_document(body.get("filter").ok_or_else(|| CommandError::bad_value("'filter' is required"))?)?.clone();
            let limit = if kind == "deleteOne" { 1 } else { 0 };
            let deleted = store.delete(ns, vec![DeleteOp { filter, limit }])?;
            tally.n_deleted += deleted as i64;
        }
        other => {
            return Err(CommandError::not_implemented(format!("bulk write operation '{other}'")));
        }
    }
    Ok(())
}

/// `{bulkWrite: <coll>, ops: [{insertOne: {...}} | {updateOne: {...}} | ...], ordered}`.
pub fn bulk_write(ctx: &HandlerCtx) -> CommandResult<Document> {
    options::validate_shared_options(ctx.command)?;
    if !options::bool_field(ctx.command, "ordered", true)? {
        return Err(CommandError::not_implemented("unordered bulkWrite"));
    }
    let ns = Namespace::new(ctx.database.to_string(), options::target_collection(ctx.command)?);
    let ops = options::required_array(ctx.command, "ops")?;

    let mut tally = Tally::new();
    let mut write_errors = Vec::new();
    for (index, op) in ops.iter().enumerate() {
        let op = as_document(op)?;
        if let Err(err) = run_one(ctx.store, &ns, op, &mut tally) {
            let code = err.error_code();
            let mut entry = Document::new();
            entry.insert("index", Bson::Int32(index as i32));
            entry.insert("code", Bson::Int32(code.code));
            entry.insert("codeName", Bson::String(code.name.to_string()));
            entry.insert("errmsg", Bson::String(err.to_string()));
            write_errors.push(Bson::Document(entry));
            break;
        }
    }

    let mut resp = tally.into_document();
    if !write_errors.is_empty() {
        resp.insert("writeErrors", Bson::Array(write_errors));
    }
    resp.insert("ok", Bson::Double(1.0));
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::cursor::CursorRegistry;
    use docdb_storage::MemoryStore;

    #[test]
    fn stops_after_first_error_and_keeps_prior_successes() {
        let store = MemoryStore::new();
        let config = DatabaseConfig::default();
        let cursors = CursorRegistry::new();

        let cmd = Document::from_pairs([
            ("bulkWrite".to_string(), Bson::String("widgets".into())),
            (
                "ops".to_string(),
                Bson::Array(vec![
                    Bson::Document(Document::from_pairs([(
                        "insertOne".to_string(),
                        Bson::Document(Document::from_pairs([(
                            "document".to_string(),
                            Bson::Document(Document::from_pairs([("_id".to_string(), Bson::Int32(1))])),
                        )])),
                    )])),
                    Bson::Document(Document::from_pairs([(
                        "insertOne".to_string(),
                        Bson::Document(Document::from_pairs([(
                            "document".to_string(),
                            Bson::Document(Document::from_pairs([("_id".to_string(), Bson::Int32(1))])),
                        )])),
                    )])),
                    Bson::Document(Document::from_pairs([(
                        "insertOne".to_string(),
                        Bson::Document(Document::from_pairs([(
                            "document".to_string(),
                            Bson::Document(Document::from_pairs([("_id".to_string(), Bson::Int32(2))])),
                        )])),
                    )])),
                ]),
            ),
        ]);
        let ctx = HandlerCtx { store: &store, command: &cmd, database: "test", config: &config, cursors: &cursors };
        let resp = bulk_write(&ctx).unwrap();

        assert_eq!(resp.get("nInserted"), Some(&Bson::Int64(1)));
        let errors = resp.get("writeErrors").and_then(Bson::as_array).unwrap();
        assert_eq!(errors.len(), 1);
        let first_error = errors[0].as_document().unwrap();
        assert_eq!(first_error.get("index"), Some(&Bson::Int32(1)));
        assert_eq!(first_error.get("code"), Some(&Bson::Int32(11000)));

        assert_eq!(store.find(&Namespace::new("test", "widgets"), &Document::new(), None).unwrap().len(), 1);
    }
}
