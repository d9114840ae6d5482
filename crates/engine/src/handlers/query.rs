//! `aggregate` (§4.2, §9 "`$out`/`$merge` stage-position check lives at the
//! adapter layer" — enforced inside `docdb_storage::aggregate::run`, not here).

use docdb_core::{Bson, CommandResult, Namespace};

use crate::options;

use super::{cursor_ops::cursor_response, HandlerCtx};

/// `{aggregate: <coll>, pipeline: [...], cursor: {batchSize?}}`.
pub fn aggregate(ctx: &HandlerCtx) -> CommandResult<docdb_core::Document> {
    options::validate_shared_options(ctx.command)?;
    let ns = Namespace::new(ctx.database.to_string(), options::target_collection(ctx.command)?);
    let pipeline = options::required_array(ctx.command, "pipeline")?
        .iter()
        .map(|v| match v {
            Bson::Document(d) => Ok(d.clone()),
            other => Err(docdb_core::CommandError::type_mismatch("object", other.type_name())),
        })
        .collect::<CommandResult<Vec<_>>>()?;
    let collation = options::optional_document(ctx.command, "collation")?;

    let results = ctx.store.aggregate(&ns, &pipeline, collation)?;

    let batch_size = options::optional_document(ctx.command, "cursor")?
        .map(|c| options::usize_field(c, "batchSize", ctx.config.default_cursor_batch_size()))
        .transpose()?
        .unwrap_or_else(|| ctx.config.default_cursor_batch_size())
        .min(ctx.config.max_batch_size());

    let (cursor_id, first_batch) = ctx.cursors.open(ns.clone(), results.into(), batch_size);
    Ok(cursor_response(&ns, cursor_id, first_batch, "firstBatch"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::cursor::CursorRegistry;
    use docdb_core::Document;
    use docdb_storage::MemoryStore;

    #[test]
    fn aggregate_returns_a_cursor_envelope() {
        let store = MemoryStore::new();
        store
            .insert(
                &Namespace::new("test", "widgets"),
                vec![Document::from_pairs([("qty".to_string(), Bson::Int32(2))])],
            )
            .unwrap();
        let config = DatabaseConfig::default();
        let cursors = CursorRegistry::new();

        let cmd = Document::from_pairs([
            ("aggregate".to_string(), Bson::String("widgets".into())),
            ("pipeline".to_string(), Bson::Array(vec![])),
        ]);
        let ctx = HandlerCtx { store: &store, command: &cmd, database: "test", config: &config, cursors: &cursors };
        let resp = aggregate(&ctx).unwrap();
        assert_eq!(resp.get("ok"), Some(&Bson::Double(1.0)));
    }
}
