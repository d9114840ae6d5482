//! `createIndexes`, `listIndexes` (§4.2, §6 "index metadata document shape").

use docdb_core::{Bson, CommandError, CommandResult, Document, IndexSpec, Namespace};

use crate::options;

use super::HandlerCtx;

fn parse_index_spec(value: &Bson) -> CommandResult<IndexSpec> {
    let spec = match value {
        Bson::Document(d) => d,
        other => return Err(CommandError::type_mismatch("object", other.type_name())),
    };
    let key = match spec.get("key") {
        Some(Bson::Document(d)) => d.clone(),
        Some(other) => return Err(CommandError::type_mismatch("object", other.type_name())),
        None => return Err(CommandError::bad_value("'key' is required")),
    };
    let name = match spec.get("name") {
        Some(Bson::String(s)) => Some(s.clone()),
        Some(other) => return Err(CommandError::type_mismatch("string", other.type_name())),
        None => None,
    };
    let unique = matches!(spec.get("unique"), Some(Bson::Boolean(true)));
    let sparse = matches!(spec.get("sparse"), Some(Bson::Boolean(true)));
    let partial_filter_expression = match spec.get("partialFilterExpression") {
        Some(Bson::Document(d)) => Some(d.clone()),
        None => None,
        Some(other) => return Err(CommandError::type_mismatch("object", other.type_name())),
    };
    let collation = match spec.get("collation") {
        Some(Bson::Document(d)) => Some(d.clone()),
        None => None,
        Some(other) => return Err(CommandError::type_mismatch("object", other.type_name())),
    };
    let expire_after_seconds = match spec.get("expireAfterSeconds") {
        Some(Bson::Int32(n)) => Some(*n as i64),
        Some(Bson::Int64(n)) => Some(*n),
        None => None,
        Some(other) => return Err(CommandError::type_mismatch("int", other.type_name())),
    };
    Ok(IndexSpec {
        name,
        key,
        unique,
        sparse,
        partial_filter_expression,
        collation,
        expire_after_seconds,
    })
}

/// `{createIndexes: <coll>, indexes: [{key, name?, unique?, ...}, ...]}`.
pub fn create_indexes(ctx: &HandlerCtx) -> CommandResult<Document> {
    options::validate_shared_options(ctx.command)?;
    let ns = Namespace::new(ctx.database.to_string(), options::target_collection(ctx.command)?);
    let specs = options::required_array(ctx.command, "indexes")?
        .iter()
        .map(parse_index_spec)
        .collect::<CommandResult<Vec<_>>>()?;

    let result = ctx.store.create_indexes(&ns, specs)?;
    let mut resp = Document::new();
    resp.insert("numIndexesBefore", Bson::Int32(result.num_indexes_before));
    resp.insert("numIndexesAfter", Bson::Int32(result.num_indexes_after));
    resp.insert("ok", Bson::Double(1.0));
    Ok(resp)
}

fn index_metadata_to_document(meta: docdb_core::IndexMetadata) -> Bson {
    let mut doc = Document::new();
    doc.insert("v", Bson::Int32(meta.v));
    doc.insert("key", Bson::Document(meta.key));
    doc.insert("name", Bson::String(meta.name));
    doc.insert("ns", Bson::String(meta.ns));
    if let Some(unique) = meta.unique {
        doc.insert("unique", Bson::Boolean(unique));
    }
    if let Some(sparse) = meta.sparse {
        doc.insert("sparse", Bson::Boolean(sparse));
    }
    if let Some(partial) = meta.partial_filter_expression {
        doc.insert("partialFilterExpression", Bson::Document(partial));
    }
    if let Some(ttl) = meta.expire_after_seconds {
        doc.insert("expireAfterSeconds", Bson::Int64(ttl));
    }
    Bson::Document(doc)
}

/// `{listIndexes: <coll>}` → a cursor-style batch of index metadata documents.
pub fn list_indexes(ctx: &HandlerCtx) -> CommandResult<Document> {
    let ns = Namespace::new(ctx.database.to_string(), options::target_collection(ctx.command)?);
    let indexes = ctx.store.list_indexes(&ns)?;
    let batch = indexes.into_iter().map(index_metadata_to_document).collect::<Vec<_>>();

    let mut cursor = Document::new();
    cursor.insert("id", Bson::Int64(0));
    cursor.insert("ns", Bson::String(ns.as_wire_string()));
    cursor.insert("firstBatch", Bson::Array(batch));

    let mut resp = Document::new();
    resp.insert("cursor", Bson::Document(cursor));
    resp.insert("ok", Bson::Double(1.0));
    Ok(resp)
}
