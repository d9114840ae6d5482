//! Handlers that don't touch the store at all: `hello`, `ping`, `buildInfo`,
//! `getParameter` (§4.2).

use docdb_core::{Bson, CommandResult, Document};

use super::HandlerCtx;

fn ok_document() -> Document {
    let mut doc = Document::new();
    doc.insert("ok", Bson::Double(1.0));
    doc
}

/// `{hello: 1}` → a minimal topology description; this engine is always a
/// single standalone node, so the shape is fixed regardless of input.
pub fn hello(_ctx: &HandlerCtx) -> CommandResult<Document> {
    let mut doc = Document::new();
    doc.insert("isWritablePrimary", Bson::Boolean(true));
    doc.insert("maxWireVersion", Bson::Int32(17));
    doc.insert("minWireVersion", Bson::Int32(0));
    doc.insert("readOnly", Bson::Boolean(false));
    doc.insert("ok", Bson::Double(1.0));
    Ok(doc)
}

/// `{ping: 1}` → `{ok: 1.0}`.
pub fn ping(_ctx: &HandlerCtx) -> CommandResult<Document> {
    Ok(ok_document())
}

/// `{buildInfo: 1}` → a fixed version document.
pub fn build_info(_ctx: &HandlerCtx) -> CommandResult<Document> {
    let mut doc = ok_document();
    doc.insert("version", Bson::String(env!("CARGO_PKG_VERSION").to_string()));
    Ok(doc)
}

/// `{getParameter: 1, ...names}` → echoes each requested parameter name back
/// with `Bson::Null` (no runtime-tunable server parameters are modeled);
/// unknown-parameter rejection is intentionally not implemented (§1 Non-goals
/// "does not reproduce every option of every command").
pub fn get_parameter(ctx: &HandlerCtx) -> CommandResult<Document> {
    let mut doc = ok_document();
    for (key, value) in ctx.command.iter() {
        if key == "getParameter" || key.starts_with('$') {
            continue;
        }
        if matches!(value, Bson::Boolean(true) | Bson::Int32(1)) {
            doc.insert(key.clone(), Bson::Null);
        }
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::cursor::CursorRegistry;
    use docdb_storage::MemoryStore;

    #[test]
    fn ping_returns_ok() {
        let store = MemoryStore::new();
        let config = DatabaseConfig::default();
        let cursors = CursorRegistry::new();
        let cmd = Document::from_pairs([("ping".to_string(), Bson::Int32(1))]);
        let ctx = HandlerCtx {
            store: &store,
            command: &cmd,
            database: "test",
            config: &config,
            cursors: &cursors,
        };
        assert_eq!(ping(&ctx).unwrap().get("ok"), Some(&Bson::Double(1.0)));
    }
}
