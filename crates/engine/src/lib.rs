//! The command dispatcher: routes wire-level command documents to handlers,
//! manages transaction snapshots through the session pool, and tracks open
//! cursors (§4).
//!
//! [`Dispatcher`] is the crate's single entry point: build one over a
//! concrete [`docdb_core::TransactionalStore`] (the default being
//! [`docdb_storage::MemoryStore`]) and call [`Dispatcher::dispatch`] with
//! each inbound command document.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod cursor;
pub mod dispatch;
pub mod handlers;
pub mod options;
pub mod transaction;

pub use config::DatabaseConfig;
pub use cursor::CursorRegistry;
pub use dispatch::Dispatcher;
pub use handlers::HandlerCtx;
