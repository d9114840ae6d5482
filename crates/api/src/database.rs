//! A database handle scoped to one database name (§6 "Ambient: embeddable facade").

use std::sync::Arc;

use docdb_core::{Bson, Document};
use docdb_engine::Dispatcher;
use docdb_storage::MemoryStore;

use crate::collection::Collection;
use crate::error::{self, Result};
use crate::session::Session;

/// A handle scoped to one database name. Every [`Collection`] it hands out
/// targets this database.
#[derive(Clone)]
pub struct Database {
    dispatcher: Arc<Dispatcher<MemoryStore>>,
    name: String,
}

impl Database {
    pub(crate) fn new(dispatcher: Arc<Dispatcher<MemoryStore>>, name: String) -> Self {
        Database { dispatcher, name }
    }

    /// The database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A handle to a collection within this database.
    pub fn collection(&self, name: impl Into<String>) -> Collection {
        Collection::new(Arc::clone(&self.dispatcher), self.name.clone(), name.into())
    }

    /// Starts a new session for multi-command transactions against this
    /// client. Sessions are not scoped to a database; pass one to
    /// [`Collection`] methods that accept `Option<&mut Session>`.
    pub fn start_session(&self) -> Session {
        Session::new(Arc::clone(&self.dispatcher))
    }

    /// Sends `{ping: 1}`.
    pub fn ping(&self) -> Result<()> {
        let mut cmd = Document::new();
        cmd.insert("ping", Bson::Int32(1));
        self.run_command(cmd).map(|_| ())
    }

    /// Sends an arbitrary command document, stamped with this database's
    /// `$db`. Escape hatch for commands the typed surface doesn't cover.
    pub fn run_command(&self, mut cmd: Document) -> Result<Document> {
        cmd.insert("$db", Bson::String(self.name.clone()));
        error::check(self.dispatcher.dispatch(&cmd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docdb_engine::DatabaseConfig;

    #[test]
    fn ping_succeeds_against_a_fresh_database() {
        let db = Database::new(Arc::new(Dispatcher::new(DatabaseConfig::default())), "test".into());
        db.ping().unwrap();
    }
}
