//! Client-side cursor iteration (§4.4 "Cursor registry").
//!
//! Wraps the `{cursor: {id, ns, firstBatch|nextBatch}}` envelope shape in a
//! plain [`Iterator`], issuing `getMore` against the engine's cursor
//! registry as each batch drains. `id == 0` means the engine already
//! returned every matching document; no `getMore` round trip follows.

use std::collections::VecDeque;
use std::sync::Arc;

use docdb_core::{Bson, Document};
use docdb_engine::Dispatcher;
use docdb_storage::MemoryStore;

use crate::error::{self, Error};

/// An iterator over a cursor's remaining documents, fetching batches from
/// the engine as needed.
pub struct Cursor {
    dispatcher: Arc<Dispatcher<MemoryStore>>,
    collection: String,
    id: i64,
    batch: VecDeque<Document>,
}

impl Cursor {
    pub(crate) fn from_response(
        dispatcher: Arc<Dispatcher<MemoryStore>>,
        collection: String,
        response: Document,
    ) -> error::Result<Self> {
        let response = error::check(response)?;
        let (id, batch) = extract_batch(&response)?;
        Ok(Cursor { dispatcher, collection, id, batch })
    }

    fn fetch_more(&mut self) -> error::Result<()> {
        let mut cmd = Document::new();
        cmd.insert("getMore", Bson::Int64(self.id));
        cmd.insert("collection", Bson::String(self.collection.clone()));
        let response = error::check(self.dispatcher.dispatch(&cmd))?;
        let (id, batch) = extract_batch(&response)?;
        self.id = id;
        self.batch = batch;
        Ok(())
    }
}

fn extract_batch(response: &Document) -> error::Result<(i64, VecDeque<Document>)> {
    let cursor = match response.get("cursor").and_then(Bson::as_document) {
        Some(c) => c,
        None => {
            return Err(Error {
                code: 0,
                code_name: "Internal".to_string(),
                message: "response carried no cursor field".to_string(),
                labels: Vec::new(),
            })
        }
    };
    let id = match cursor.get("id") {
        Some(Bson::Int64(n)) => *n,
        _ => 0,
    };
    let batch = cursor
        .get("firstBatch")
        .or_else(|| cursor.get("nextBatch"))
        .and_then(Bson::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_document().cloned())
                .collect()
        })
        .unwrap_or_default();
    Ok((id, batch))
}

impl Iterator for Cursor {
    type Item = error::Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(doc) = self.batch.pop_front() {
            return Some(Ok(doc));
        }
        if self.id == 0 {
            return None;
        }
        if let Err(err) = self.fetch_more() {
            return Some(Err(err));
        }
        self.batch.pop_front().map(Ok)
    }
}
