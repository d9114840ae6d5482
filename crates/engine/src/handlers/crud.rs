//! `insert`, `find`, `countDocuments`, `distinct`, `update`, `delete`,
//! `replaceOne`, `findAndModify` and its `findOneAnd*` aliases (§4.2, §4.6).

use std::collections::HashSet;

use docdb_core::{Bson, CommandError, CommandResult, Document, Namespace, UpdateOp};
use docdb_storage::filter;

use crate::options::{self, ReturnDocument};

use super::{cursor_ops::cursor_response, HandlerCtx};

fn ok_document() -> Document {
    let mut doc = Document::new();
    doc.insert("ok", Bson::Double(1.0));
    doc
}

fn namespace(ctx: &HandlerCtx, collection: String) -> Namespace {
    Namespace::new(ctx.database.to_string(), collection)
}

fn as_document(value: &Bson) -> CommandResult<Document> {
    match value {
        Bson::Document(d) => Ok(d.clone()),
        other => Err(CommandError::type_mismatch("object", other.type_name())),
    }
}

/// `{insert: <coll>, documents: [...]}`.
pub fn insert(ctx: &HandlerCtx) -> CommandResult<Document> {
    options::validate_shared_options(ctx.command)?;
    let ns = namespace(ctx, options::target_collection(ctx.command)?);
    let docs = options::required_array(ctx.command, "documents")?
        .iter()
        .map(as_document)
        .collect::<CommandResult<Vec<_>>>()?;
    let result = ctx.store.insert(&ns, docs)?;
    let mut resp = ok_document();
    resp.insert("n", Bson::Int32(result.inserted_count as i32));
    Ok(resp)
}

/// `{find: <coll>, filter: {...}, skip, limit, batchSize}` → a cursor envelope.
pub fn find(ctx: &HandlerCtx) -> CommandResult<Document> {
    options::validate_shared_options(ctx.command)?;
    let ns = namespace(ctx, options::target_collection(ctx.command)?);
    let query = options::optional_document(ctx.command, "filter")?.cloned().unwrap_or_default();
    let collation = options::optional_document(ctx.command, "collation")?;
    let mut docs = ctx.store.find(&ns, &query, collation)?;

    let skip = options::usize_field(ctx.command, "skip", 0)?;
    if skip > 0 {
        docs = docs.into_iter().skip(skip).collect();
    }
    if let Some(limit) = options::int_field(ctx.command, "limit")? {
        if limit > 0 {
            docs.truncate(limit as usize);
        }
    }

    let batch_size = options::usize_field(ctx.command, "batchSize", ctx.config.default_cursor_batch_size())?
        .min(ctx.config.max_batch_size());
    let (cursor_id, first_batch) = ctx.cursors.open(ns.clone(), docs.into(), batch_size);
    Ok(cursor_response(&ns, cursor_id, first_batch, "firstBatch"))
}

/// `{countDocuments: <coll>, query: {...}}`.
pub fn count_documents(ctx: &HandlerCtx) -> CommandResult<Document> {
    options::validate_shared_options(ctx.command)?;
    let ns = namespace(ctx, options::target_collection(ctx.command)?);
    let query = options::optional_document(ctx.command, "query")?.cloned().unwrap_or_default();
    let docs = ctx.store.find(&ns, &query, None)?;
    let mut resp = ok_document();
    resp.insert("n", Bson::Int64(docs.len() as i64));
    Ok(resp)
}

/// `{distinct: <coll>, key: "<path>", query: {...}}`.
pub fn distinct(ctx: &HandlerCtx) -> CommandResult<Document> {
    options::validate_shared_options(ctx.command)?;
    let ns = namespace(ctx, options::target_collection(ctx.command)?);
    let key = match ctx.command.get("key") {
        Some(Bson::String(s)) => s.clone(),
        Some(other) => return Err(CommandError::type_mismatch("string", other.type_name())),
        None => return Err(CommandError::bad_value("'key' is required")),
    };
    let query = options::optional_document(ctx.command, "query")?.cloned().unwrap_or_default();
    let docs = ctx.store.find(&ns, &query, None)?;

    let mut seen = HashSet::new();
    let mut values = Vec::new();
    for doc in &docs {
        if let Some(value) = filter::resolve_path(doc, &key) {
            let dedup_key = (value.type_name(), value.to_string());
            if seen.insert(dedup_key) {
                values.push(value);
            }
        }
    }
    let mut resp = ok_document();
    resp.insert("values", Bson::Array(values));
    Ok(resp)
}

fn parse_update_op(filter_value: &Bson, update_value: &Bson, multi: bool, upsert: bool) -> CommandResult<UpdateOp> {
    let filter = as_document(filter_value)?;
    let update = as_document(update_value)?;
    if !options::is_operator_update(&update) && multi {
        return Err(CommandError::bad_value(
            "replacement-style updates are only permitted with multi=false",
        ));
    }
    Ok(UpdateOp {
        filter,
        update,
        multi,
        upsert,
        array_filters: Vec::new(),
    })
}

/// `{update: <coll>, updates: [{q, u, multi, upsert}, ...]}`.
pub fn update(ctx: &HandlerCtx) -> CommandResult<Document> {
    options::validate_shared_options(ctx.command)?;
    let ns = namespace(ctx, options::target_collection(ctx.command)?);
    let specs = options::required_array(ctx.command, "updates")?;

    let mut ops = Vec::with_capacity(specs.len());
    for spec in specs {
        let spec = match spec {
            Bson::Document(d) => d,
            other => return Err(CommandError::type_mismatch("object", other.type_name())),
        };
        let q = spec.get("q").ok_or_else(|| CommandError::bad_value("'q' is required"))?;
        let u = spec.get("u").ok_or_else(|| CommandError::bad_value("'u' is required"))?;
        let multi = matches!(spec.get("multi"), Some(Bson::Boolean(true)));
        let upsert = matches!(spec.get("upsert"), Some(Bson::Boolean(true)));
        ops.push(parse_update_op(q, u, multi, upsert)?);
    }

    let result = ctx.store.update(&ns, ops)?;
    let mut resp = ok_document();
    resp.insert("n", Bson::Int64(result.matched_count as i64));
    resp.insert("nModified", Bson::Int64(result.modified_count as i64));
    if !result.upserted.is_empty() {
        let upserted = result
            .upserted
            .into_iter()
            .map(|u| {
                let mut entry = Document::new();
                entry.insert("index", Bson::Int32(u.index as i32));
                entry.insert("_id", u.id);
                Bson::Document(entry)
            })
            .collect();
        resp.insert("upserted", Bson::Array(upserted));
    }
    Ok(resp)
}

/// `{delete: <coll>, deletes: [{q, limit}, ...]}`.
pub fn delete(ctx: &HandlerCtx) -> CommandResult<Document> {
    options::validate_shared_options(ctx.command)?;
    let ns = namespace(ctx, options::target_collection(ctx.command)?);
    let specs = options::required_array(ctx.command, "deletes")?;

    let mut ops = Vec::with_capacity(specs.len());
    for spec in specs {
        let spec = match spec {
            Bson::Document(d) => d,
            other => return Err(CommandError::type_mismatch("object", other.type_name())),
        };
        let filter = as_document(spec.get("q").ok_or_else(|| CommandError::bad_value("'q' is required"))?)?;
        let limit = match spec.get("limit") {
            Some(Bson::Int32(n)) => *n as u32,
            Some(Bson::Int64(n)) => *n as u32,
            None => 0,
            Some(other) => return Err(CommandError::type_mismatch("int", other.type_name())),
        };
        if limit > 1 {
            return Err(CommandError::bad_value("'limit' must be 0 or 1"));
        }
        ops.push(docdb_core::DeleteOp { filter, limit });
    }

    let deleted = ctx.store.delete(&ns, ops)?;
    let mut resp = ok_document();
    resp.insert("n", Bson::Int64(deleted as i64));
    Ok(resp)
}

/// `{replaceOne: <coll>, filter: {...}, replacement: {...}, upsert}`.
pub fn replace_one(ctx: &HandlerCtx) -> CommandResult<Document> {
    options::validate_shared_options(ctx.command)?;
    let ns = namespace(ctx, options::target_collection(ctx.command)?);
    let filter = options::required_document(ctx.command, "filter")?.clone();
    let replacement = options::required_document(ctx.command, "replacement")?.clone();
    if options::is_operator_update(&replacement) {
        return Err(CommandError::bad_value("'replacement' must not contain operator keys"));
    }
    let upsert = options::bool_field(ctx.command, "upsert", false)?;

    let result = ctx.store.update(
        &ns,
        vec![UpdateOp {
            filter,
            update: replacement,
            multi: false,
            upsert,
            array_filters: Vec::new(),
        }],
    )?;
    let mut resp = ok_document();
    resp.insert("n", Bson::Int64(result.matched_count as i64));
    resp.insert("nModified", Bson::Int64(result.modified_count as i64));
    Ok(resp)
}

/// The internal `findAndModify` shape every `findOneAnd*` alias desugars to
/// (§4.2 "Translated to the internal findAndModify shape").
struct FindAndModifyArgs {
    filter: Document,
    update: Option<Document>,
    remove: bool,
    upsert: bool,
    return_document: ReturnDocument,
}

fn run_find_and_modify(ctx: &HandlerCtx, args: FindAndModifyArgs) -> CommandResult<Document> {
    let ns = namespace(ctx, options::target_collection(ctx.command)?);
    let before = ctx.store.find(&ns, &args.filter, None)?.into_iter().next();

    let value = if args.remove {
        if let Some(before_doc) = &before {
            ctx.store.delete(
                &ns,
                vec![docdb_core::DeleteOp {
                    filter: args.filter.clone(),
                    limit: 1,
                }],
            )?;
            Some(before_doc.clone())
        } else {
            None
        }
    } else {
        let update_doc = args
            .update
            .ok_or_else(|| CommandError::bad_value("'update' is required unless 'remove' is set"))?;
        let result = ctx.store.update(
            &ns,
            vec![UpdateOp {
                filter: args.filter.clone(),
                update: update_doc,
                multi: false,
                upsert: args.upsert,
                array_filters: Vec::new(),
            }],
        )?;
        match args.return_document {
            ReturnDocument::Before => before,
            ReturnDocument::After => {
                let id = before
                    .as_ref()
                    .and_then(|d| d.get("_id").cloned())
                    .or_else(|| result.upserted.first().map(|u| u.id.clone()));
                match id {
                    Some(id) => {
                        let mut id_filter = Document::new();
                        id_filter.insert("_id", id);
                        ctx.store.find(&ns, &id_filter, None)?.into_iter().next()
                    }
                    None => None,
                }
            }
        }
    };

    let mut resp = ok_document();
    resp.insert("value", value.map(Bson::Document).unwrap_or(Bson::Null));
    Ok(resp)
}

/// `{findAndModify: <coll>, query, update?, remove?, new?, upsert?}`.
pub fn find_and_modify(ctx: &HandlerCtx) -> CommandResult<Document> {
    options::validate_shared_options(ctx.command)?;
    let filter = options::optional_document(ctx.command, "query")?.cloned().unwrap_or_default();
    let remove = options::bool_field(ctx.command, "remove", false)?;
    let upsert = options::bool_field(ctx.command, "upsert", false)?;
    let update = options::optional_document(ctx.command, "update")?.cloned();
    let return_document = ReturnDocument::parse(ctx.command)?;
    run_find_and_modify(
        ctx,
        FindAndModifyArgs { filter, update, remove, upsert, return_document },
    )
}

/// `{findOneAndUpdate: <coll>, filter, update, upsert?, returnDocument?}`.
pub fn find_one_and_update(ctx: &HandlerCtx) -> CommandResult<Document> {
    options::validate_shared_options(ctx.command)?;
    let filter = options::required_document(ctx.command, "filter")?.clone();
    let update = options::required_document(ctx.command, "update")?.clone();
    if !options::is_operator_update(&update) {
        return Err(CommandError::bad_value("'update' must be operator-style"));
    }
    let upsert = options::bool_field(ctx.command, "upsert", false)?;
    let return_document = ReturnDocument::parse(ctx.command)?;
    run_find_and_modify(
        ctx,
        FindAndModifyArgs { filter, update: Some(update), remove: false, upsert, return_document },
    )
}

/// `{findOneAndReplace: <coll>, filter, replacement, upsert?, returnDocument?}`.
pub fn find_one_and_replace(ctx: &HandlerCtx) -> CommandResult<Document> {
    options::validate_shared_options(ctx.command)?;
    let filter = options::required_document(ctx.command, "filter")?.clone();
    let replacement = options::required_document(ctx.command, "replacement")?.clone();
    if options::is_operator_update(&replacement) {
        return Err(CommandError::bad_value("'replacement' must not contain operator keys"));
    }
    let upsert = options::bool_field(ctx.command, "upsert", false)?;
    let return_document = ReturnDocument::parse(ctx.command)?;
    run_find_and_modify(
        ctx,
        FindAndModifyArgs { filter, update: Some(replacement), remove: false, upsert, return_document },
    )
}

/// `{findOneAndDelete: <coll>, filter}`.
pub fn find_one_and_delete(ctx: &HandlerCtx) -> CommandResult<Document> {
    options::validate_shared_options(ctx.command)?;
    let filter = options::required_document(ctx.command, "filter")?.clone();
    run_find_and_modify(
        ctx,
        FindAndModifyArgs {
            filter,
            update: None,
            remove: true,
            upsert: false,
            return_document: ReturnDocument::Before,
        },
    )
}
