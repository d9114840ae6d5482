//! The embeddable facade's entry point (§6 "Ambient: embeddable facade").
//!
//! [`Client`] owns one [`docdb_engine::Dispatcher`] over a fresh
//! [`docdb_storage::MemoryStore`] and hands out [`Database`](crate::database::Database)
//! handles scoped to a database name. There is no connection, no network
//! round trip: every facade call below desugars to exactly one
//! `Dispatcher::dispatch` call, mirroring the teacher's `FacadeImpl`
//! wrapping `SubstrateImpl` (`facade/impl_.rs`).

use std::sync::Arc;

use docdb_engine::DatabaseConfig;
use docdb_storage::MemoryStore;

use crate::database::Database;

/// A handle to one in-process document store.
///
/// Cheap to clone: internally an `Arc` around the dispatcher, so every
/// clone shares the same data.
#[derive(Clone)]
pub struct Client {
    dispatcher: Arc<docdb_engine::Dispatcher<MemoryStore>>,
}

impl Client {
    /// Opens a client with default configuration.
    pub fn new() -> Self {
        Self::with_config(DatabaseConfig::default())
    }

    /// Opens a client with the given engine configuration.
    pub fn with_config(config: DatabaseConfig) -> Self {
        Client {
            dispatcher: Arc::new(docdb_engine::Dispatcher::new(config)),
        }
    }

    /// Returns a handle to `name`, the database every subsequent command
    /// on it will target.
    pub fn database(&self, name: impl Into<String>) -> Database {
        Database::new(Arc::clone(&self.dispatcher), name.into())
    }

    /// Returns a handle to the engine's configured default database.
    pub fn default_database(&self) -> Database {
        self.database(docdb_core::DEFAULT_DATABASE)
    }

    /// The underlying dispatcher, for callers that need to send a raw
    /// command document the typed surface doesn't cover.
    pub fn dispatcher(&self) -> &docdb_engine::Dispatcher<MemoryStore> {
        &self.dispatcher
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}
