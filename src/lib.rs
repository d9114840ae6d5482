//! # docdb
//!
//! An embedded, transactional document database with a wire command surface:
//! insert/find/update/delete/aggregate commands, multi-document ACID
//! transactions over a session/transaction-number pair, cursors for paged
//! results, and a bulk write path with ordered stop-on-error semantics.
//!
//! # Quick Start
//!
//! ```no_run
//! use docdb::{Client, Document, Bson};
//!
//! let client = Client::new();
//! let widgets = client.default_database().collection("widgets");
//!
//! let mut doc = Document::new();
//! doc.insert("_id", Bson::Int32(1));
//! doc.insert("name", Bson::String("sprocket".into()));
//! widgets.insert_one(doc)?;
//!
//! let mut filter = Document::new();
//! filter.insert("_id", Bson::Int32(1));
//! assert!(widgets.find_one(filter)?.is_some());
//! # Ok::<(), docdb::Error>(())
//! ```
//!
//! # Transactions
//!
//! ```no_run
//! use docdb::{Client, Document, Bson};
//!
//! let client = Client::new();
//! let db = client.default_database();
//! let widgets = db.collection("widgets");
//!
//! let mut session = db.start_session();
//! session.start_transaction();
//! widgets.insert_many_in_session(vec![Document::new()], &mut session)?;
//! session.commit_transaction()?;
//! # Ok::<(), docdb::Error>(())
//! ```
//!
//! # Architecture
//!
//! [`Client`] is the entry point; it hands out [`Database`] handles scoped to
//! a database name, which hand out [`Collection`] handles scoped to a
//! namespace. Internal crates (storage, concurrency, wire, engine) implement
//! the command dispatcher, storage engine, and transaction/session machinery
//! this crate's facade wraps; only the surface re-exported here is stable.

pub use docdb_api::{
    BulkWriteResult, Client, Collection, Cursor, Database, Error, InsertResult, ReturnDocument, Session,
    UpdateResult, WriteModel,
};
pub use docdb_core::{Bson, Document, ObjectId};

/// JSON encode/decode boundary for embedding and testing against a
/// non-Rust caller, without standing up a socket server. Not used by
/// [`Client`]: the facade dispatches `Document`s in-process.
pub use docdb_wire as wire;
