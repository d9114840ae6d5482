//! Per-command handlers (§4.2).
//!
//! Each handler is a pure function of a [`HandlerCtx`] — the store view,
//! the command document, the active database name, engine configuration,
//! and the cursor registry — and the command itself. Handlers never reach
//! past `ctx` for state; everything they need is handed to them explicitly.

pub mod admin;
pub mod bulk;
pub mod crud;
pub mod cursor_ops;
pub mod index;
pub mod query;

use docdb_core::{CommandResult, CommandStore, Document};

use crate::config::DatabaseConfig;
use crate::cursor::CursorRegistry;

/// Everything a handler needs to execute one command.
pub struct HandlerCtx<'a> {
    /// The store this command runs against: global, or a transaction's
    /// tracked snapshot (§4.1, §9 "Scoped current-store reference").
    pub store: &'a dyn CommandStore,
    /// The full command document, first key already resolved to this handler.
    pub command: &'a Document,
    /// The database the command targets (`$db` or the configured default).
    pub database: &'a str,
    /// Engine-wide configuration (cursor batch sizes, default database).
    pub config: &'a DatabaseConfig,
    /// The shared cursor registry.
    pub cursors: &'a CursorRegistry,
}

/// The shape every registered handler implements.
pub type HandlerFn = fn(&HandlerCtx) -> CommandResult<Document>;
