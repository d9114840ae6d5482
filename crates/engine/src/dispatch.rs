//! The dispatcher (§4.1).
//!
//! Resolves a command's first key (lowercased) against a registered-handler
//! map built once via `once_cell::sync::Lazy`, runs the transaction
//! validator, and hands the handler a per-call [`HandlerCtx`] scoped to the
//! global store, or a transaction's tracked snapshot — never ambient state.
//! `commitTransaction`/`abortTransaction` are resolved here directly rather
//! than through the handler map, since they act on the session pool itself
//! rather than a `CommandStore` view (§4.1 "Routing").

use std::collections::HashMap;

use dashmap::DashMap;
use docdb_core::{Bson, CommandError, CommandResult, Document, ErrorLabel, TransactionalStore};
use docdb_concurrency::SessionPool;
use once_cell::sync::Lazy;

use crate::config::DatabaseConfig;
use crate::cursor::CursorRegistry;
use crate::handlers::{self, HandlerCtx, HandlerFn};
use crate::options;
use crate::transaction::{self, Routing};

static HANDLERS: Lazy<HashMap<&'static str, HandlerFn>> = Lazy::new(|| {
    let mut map: HashMap<&'static str, HandlerFn> = HashMap::new();
    map.insert("hello", handlers::admin::hello);
    map.insert("ismaster", handlers::admin::hello);
    map.insert("ping", handlers::admin::ping);
    map.insert("buildinfo", handlers::admin::build_info);
    map.insert("getparameter", handlers::admin::get_parameter);
    map.insert("insert", handlers::crud::insert);
    map.insert("find", handlers::crud::find);
    map.insert("countdocuments", handlers::crud::count_documents);
    map.insert("distinct", handlers::crud::distinct);
    map.insert("update", handlers::crud::update);
    map.insert("delete", handlers::crud::delete);
    map.insert("replaceone", handlers::crud::replace_one);
    map.insert("findandmodify", handlers::crud::find_and_modify);
    map.insert("findoneandupdate", handlers::crud::find_one_and_update);
    map.insert("findoneandreplace", handlers::crud::find_one_and_replace);
    map.insert("findoneanddelete", handlers::crud::find_one_and_delete);
    map.insert("bulkwrite", handlers::bulk::bulk_write);
    map.insert("aggregate", handlers::query::aggregate);
    map.insert("createindexes", handlers::index::create_indexes);
    map.insert("listindexes", handlers::index::list_indexes);
    map.insert("getmore", handlers::cursor_ops::get_more);
    map.insert("killcursors", handlers::cursor_ops::kill_cursors);
    map
});

/// Orchestrates dispatch, the session pool, and the cursor registry for one
/// logical connection's worth of commands (§4.1, §4.5, §5).
pub struct Dispatcher<S: TransactionalStore + Default> {
    store: S,
    sessions: SessionPool<S>,
    cursors: CursorRegistry,
    config: DatabaseConfig,
    /// Highest `txnNumber` successfully committed per session, retained only
    /// long enough to tell a stale re-commit from a genuinely unknown one
    /// apart (§8 "Commit idempotency detection").
    last_committed: DashMap<Vec<u8>, i64>,
}

impl<S: TransactionalStore + Default> Dispatcher<S> {
    /// Builds a dispatcher over a fresh store with the given configuration.
    pub fn new(config: DatabaseConfig) -> Self {
        Dispatcher {
            store: S::default(),
            sessions: SessionPool::new(),
            cursors: CursorRegistry::new(),
            config,
            last_committed: DashMap::new(),
        }
    }

    /// Dispatches one command document to a response document. Never panics
    /// on malformed input — every error path is mapped to a failure
    /// envelope before returning (§4.1 "Error mapping").
    pub fn dispatch(&self, command: &Document) -> Document {
        let name = command.first_key().unwrap_or("").to_ascii_lowercase();
        let span = tracing::debug_span!("dispatch", command = %name);
        let _enter = span.enter();
        match self.try_dispatch(command, &name) {
            Ok(doc) => doc,
            Err(err) => err.into_envelope(),
        }
    }

    fn try_dispatch(&self, command: &Document, name: &str) -> CommandResult<Document> {
        if command.is_empty() {
            return Err(CommandError::bad_value("empty command document"));
        }
        match name {
            "committransaction" => return self.commit_transaction(command),
            "aborttransaction" => return self.abort_transaction(command),
            _ => {}
        }

        let handler = HANDLERS
            .get(name)
            .ok_or_else(|| CommandError::CommandNotFound { command: name.to_string() })?;
        let database = options::database_name(command, &self.config).to_string();

        match transaction::classify(command)? {
            Routing::NonTransactional => {
                let ctx = HandlerCtx {
                    store: &self.store,
                    command,
                    database: &database,
                    config: &self.config,
                    cursors: &self.cursors,
                };
                handler(&ctx)
            }
            Routing::StartTransaction { lsid, txn_number } => {
                self.sessions.start_transaction(lsid.clone(), txn_number, &self.store)?;
                tracing::info!(txn_number, "transaction started");
                self.run_in_transaction(handler, command, &database, &lsid, txn_number)
            }
            Routing::InTransaction { lsid, txn_number } => {
                self.run_in_transaction(handler, command, &database, &lsid, txn_number)
            }
        }
    }

    fn run_in_transaction(
        &self,
        handler: &HandlerFn,
        command: &Document,
        database: &str,
        lsid: &[u8],
        txn_number: i64,
    ) -> CommandResult<Document> {
        self.sessions.with_transaction_store(lsid, txn_number, |tracked| {
            let ctx = HandlerCtx {
                store: tracked,
                command,
                database,
                config: &self.config,
                cursors: &self.cursors,
            };
            handler(&ctx)
        })
    }

    fn commit_transaction(&self, command: &Document) -> CommandResult<Document> {
        let (lsid, txn_number) = transaction::require_session(command)?;
        match self.sessions.commit_transaction(&lsid, txn_number, &self.store) {
            Ok(()) => {
                self.last_committed.insert(lsid, txn_number);
                tracing::info!(txn_number, "transaction committed");
                Ok(ok_document())
            }
            Err(err) => {
                if self.last_committed.get(&lsid).is_some_and(|n| *n == txn_number) {
                    Err(CommandError::TransactionAlreadyCommitted)
                } else {
                    Err(relabel_unknown_commit_result(err))
                }
            }
        }
    }

    fn abort_transaction(&self, command: &Document) -> CommandResult<Document> {
        let (lsid, txn_number) = transaction::require_session(command)?;
        self.sessions.abort_transaction(&lsid, txn_number)?;
        tracing::info!(txn_number, "transaction aborted");
        Ok(ok_document())
    }
}

/// `commitTransaction` against a session the pool has no record of must not
/// be reported as transient — the client can't safely retry a commit it
/// isn't sure didn't already apply (§4.1 "Missing session on commit").
fn relabel_unknown_commit_result(err: CommandError) -> CommandError {
    match err {
        CommandError::NoSuchTransaction { reason, .. } => CommandError::NoSuchTransaction {
            reason,
            label: ErrorLabel::UnknownTransactionCommitResult,
        },
        other => other,
    }
}

fn ok_document() -> Document {
    let mut doc = Document::new();
    doc.insert("ok", Bson::Double(1.0));
    doc
}
