//! Embeddable client facade.
//!
//! This crate is the only layer application code is meant to touch: it
//! wraps [`docdb_engine::Dispatcher`] behind a typed, driver-shaped API so
//! callers build filters and updates as [`docdb_core::Document`]s and never
//! hand-assemble a command envelope themselves.
//!
//! ## Layout
//!
//! - [`Client`] opens an in-process store and hands out [`Database`] handles.
//! - [`Database`] is scoped to one database name and hands out [`Collection`] handles.
//! - [`Collection`] is the CRUD/index/aggregate surface; every method builds
//!   exactly one command document and dispatches it.
//! - [`Session`] carries the `lsid`/`txnNumber` pair that groups commands
//!   into one multi-document transaction.
//! - [`Cursor`] iterates a `find`/`aggregate`/`listIndexes` result set,
//!   issuing `getMore` transparently as batches drain.
//! - [`error::Error`] is what every fallible method here returns on failure,
//!   reconstructed from the engine's response envelope.
//!
//! ## Quick start
//!
//! ```ignore
//! use docdb_api::Client;
//!
//! let client = Client::new();
//! let widgets = client.default_database().collection("widgets");
//! widgets.insert_one(doc)?;
//! for found in widgets.find(filter)? {
//!     let found = found?;
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod collection;
pub mod cursor;
pub mod database;
pub mod error;
pub mod session;

pub use client::Client;
pub use collection::{BulkWriteResult, Collection, InsertResult, ReturnDocument, UpdateResult, WriteModel};
pub use cursor::Cursor;
pub use database::Database;
pub use error::Error;
pub use session::Session;

#[cfg(test)]
mod tests {
    use super::*;
    use docdb_core::{Bson, Document};

    #[test]
    fn end_to_end_insert_find_update_delete() {
        let client = Client::new();
        let collection = client.default_database().collection("widgets");

        let mut doc = Document::new();
        doc.insert("_id", Bson::Int32(1));
        doc.insert("count", Bson::Int32(1));
        collection.insert_one(doc).unwrap();

        let mut filter = Document::new();
        filter.insert("_id", Bson::Int32(1));
        let mut update = Document::new();
        let mut inc = Document::new();
        inc.insert("count", Bson::Int32(41));
        update.insert("$inc", Bson::Document(inc));
        let result = collection.update_one(filter.clone(), update, false).unwrap();
        assert_eq!(result.matched_count, 1);

        let found = collection.find_one(filter.clone()).unwrap().unwrap();
        assert_eq!(found.get("count"), Some(&Bson::Int32(42)));

        let deleted = collection.delete_one(filter).unwrap();
        assert_eq!(deleted, 1);
    }
}
