//! Client-side transaction sessions (§4.5 "Transaction validator and session pool").
//!
//! A [`Session`] is the facade's only transactional primitive: it owns an
//! opaque `lsid` and the next `txnNumber` to send, and stamps every command
//! routed through it with the fields the dispatcher's transaction validator
//! inspects (`lsid`, `txnNumber`, `autocommit`, `startTransaction`). Callers
//! never build those fields by hand.

use std::sync::Arc;

use docdb_core::{Bson, Document};
use docdb_engine::Dispatcher;
use docdb_storage::MemoryStore;
use uuid::Uuid;

use crate::error::{self, Result};

/// A handle to one client session, optionally wrapping an open transaction.
pub struct Session {
    dispatcher: Arc<Dispatcher<MemoryStore>>,
    lsid: Document,
    txn_number: i64,
    state: State,
}

#[derive(PartialEq)]
enum State {
    Idle,
    PendingStart,
    InTransaction,
}

impl Session {
    pub(crate) fn new(dispatcher: Arc<Dispatcher<MemoryStore>>) -> Self {
        let mut lsid = Document::new();
        lsid.insert("id", Bson::String(Uuid::new_v4().to_string()));
        Session { dispatcher, lsid, txn_number: 0, state: State::Idle }
    }

    /// Starts a new transaction on this session. The next command sent
    /// through it carries `startTransaction: true`.
    pub fn start_transaction(&mut self) {
        self.txn_number += 1;
        self.state = State::PendingStart;
    }

    /// Commits the session's open transaction.
    pub fn commit_transaction(&mut self) -> Result<()> {
        let mut cmd = Document::new();
        cmd.insert("commitTransaction", Bson::Int32(1));
        cmd.insert("lsid", Bson::Document(self.lsid.clone()));
        cmd.insert("txnNumber", Bson::Int64(self.txn_number));
        let resp = self.dispatcher.dispatch(&cmd);
        self.state = State::Idle;
        error::check(resp).map(|_| ())
    }

    /// Aborts the session's open transaction, discarding its writes.
    pub fn abort_transaction(&mut self) -> Result<()> {
        let mut cmd = Document::new();
        cmd.insert("abortTransaction", Bson::Int32(1));
        cmd.insert("lsid", Bson::Document(self.lsid.clone()));
        cmd.insert("txnNumber", Bson::Int64(self.txn_number));
        let resp = self.dispatcher.dispatch(&cmd);
        self.state = State::Idle;
        error::check(resp).map(|_| ())
    }

    /// Whether a transaction is currently open on this session.
    pub fn in_transaction(&self) -> bool {
        matches!(self.state, State::PendingStart | State::InTransaction)
    }

    /// Stamps `cmd` with this session's routing fields, consuming the
    /// pending-start flag on the first call after `start_transaction`.
    pub(crate) fn attach(&mut self, cmd: &mut Document) {
        cmd.insert("lsid", Bson::Document(self.lsid.clone()));
        if self.state == State::Idle {
            return;
        }
        cmd.insert("txnNumber", Bson::Int64(self.txn_number));
        cmd.insert("autocommit", Bson::Boolean(false));
        if self.state == State::PendingStart {
            cmd.insert("startTransaction", Bson::Boolean(true));
            self.state = State::InTransaction;
        }
    }
}
