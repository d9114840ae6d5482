//! `getMore`, `killCursors`, and the shared cursor envelope builder (§4.2,
//! §6 "Cursor envelope shape").

use docdb_core::{Bson, CommandError, CommandResult, Document, Namespace};

use crate::options;

use super::HandlerCtx;

/// Builds `{cursor: {id, ns, <batch_key>: [...]}, ok: 1.0}` (§6).
pub fn cursor_response(ns: &Namespace, cursor_id: i64, batch: Vec<Document>, batch_key: &str) -> Document {
    let mut cursor = Document::new();
    cursor.insert("id", Bson::Int64(cursor_id));
    cursor.insert("ns", Bson::String(ns.as_wire_string()));
    cursor.insert(batch_key, Bson::Array(batch.into_iter().map(Bson::Document).collect()));

    let mut resp = Document::new();
    resp.insert("cursor", Bson::Document(cursor));
    resp.insert("ok", Bson::Double(1.0));
    resp
}

/// `{getMore: <cursorId>, collection: <coll>, batchSize}`.
pub fn get_more(ctx: &HandlerCtx) -> CommandResult<Document> {
    let cursor_id = match ctx.command.get("getMore") {
        Some(Bson::Int64(id)) => *id,
        Some(Bson::Int32(id)) => *id as i64,
        Some(other) => return Err(CommandError::type_mismatch("long", other.type_name())),
        None => return Err(CommandError::bad_value("'getMore' is required")),
    };
    let collection = match ctx.command.get("collection") {
        Some(Bson::String(s)) => s.clone(),
        Some(other) => return Err(CommandError::type_mismatch("string", other.type_name())),
        None => return Err(CommandError::bad_value("'collection' is required")),
    };
    let ns = Namespace::new(ctx.database.to_string(), collection);
    let batch_size = options::usize_field(ctx.command, "batchSize", ctx.config.default_cursor_batch_size())?
        .min(ctx.config.max_batch_size());

    let (next_id, batch) = ctx.cursors.get_more(&ns, cursor_id, batch_size)?;
    Ok(cursor_response(&ns, next_id, batch, "nextBatch"))
}

/// `{killCursors: <coll>, cursors: [...]}` → `{cursorsKilled, cursorsNotFound, ok}`.
pub fn kill_cursors(ctx: &HandlerCtx) -> CommandResult<Document> {
    let ids = options::required_array(ctx.command, "cursors")?
        .iter()
        .map(|v| match v {
            Bson::Int64(id) => Ok(*id),
            Bson::Int32(id) => Ok(*id as i64),
            other => Err(CommandError::type_mismatch("long", other.type_name())),
        })
        .collect::<CommandResult<Vec<_>>>()?;

    let (killed, not_found) = ctx.cursors.kill(&ids);
    let mut resp = Document::new();
    resp.insert("cursorsKilled", Bson::Array(killed.into_iter().map(Bson::Int64).collect()));
    resp.insert("cursorsNotFound", Bson::Array(not_found.into_iter().map(Bson::Int64).collect()));
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
    fn get_more_drains_a_previously_opened_cursor() {
        let store = MemoryStore::new();
        let config = DatabaseConfig::default();
        let cursors = CursorRegistry::new();
        let ns = Namespace::new("test", "widgets");

        let docs = (0..5)
            .map(|i| Document::from_pairs([("_id".to_string(), Bson::Int32(i))]))
            .collect::<Vec<_>>();
        let (cursor_id, _first) = cursors.open(ns.clone(), docs.into(), 2);
        assert_ne!(cursor_id, 0);

        let cmd = Document::from_pairs([
            ("getMore".to_string(), Bson::Int64(cursor_id)),
            ("collection".to_string(), Bson::String("widgets".into())),
        ]);
        let ctx = HandlerCtx { store: &store, command: &cmd, database: "test", config: &config, cursors: &cursors };
        let resp = get_more(&ctx).unwrap();
        let batch = resp
            .get("cursor")
            .and_then(Bson::as_document)
            .and_then(|c| c.get("nextBatch"))
            .and_then(Bson::as_array)
            .unwrap();
        assert_eq!(batch.len(), 2);
    }
}
