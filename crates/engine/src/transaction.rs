//! Transaction command validator (§4.1 "Routing", §4.5 "Active transaction").
//!
//! Reads `lsid`/`txnNumber`/`startTransaction`/`autocommit` off a command and
//! decides whether it runs against the global store or a session's snapshot,
//! enforcing the monotonicity and "at most one in-progress transaction per
//! session" rules before any handler sees the command.

use docdb_core::{Bson, CommandError, CommandResult, Document, ErrorLabel};
use docdb_concurrency::SessionKey;

/// Where a command should be routed, per §4.1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routing {
    /// No session/transaction context: run against the global store.
    NonTransactional,
    /// `startTransaction: true`: allocate a fresh snapshot before running.
    StartTransaction {
        /// The session this transaction belongs to.
        lsid: SessionKey,
        /// The transaction number the client assigned.
        txn_number: i64,
    },
    /// A later statement of an already-open transaction.
    InTransaction {
        /// The session this transaction belongs to.
        lsid: SessionKey,
        /// The transaction number the client assigned.
        txn_number: i64,
    },
}

/// Canonicalizes a command's `lsid` document into a hashable session key.
///
/// `lsid` is compared structurally per §3/GLOSSARY; since key order within a
/// `Document` is already stable, a deterministic serialization of it is a
/// sound, opaque hash key — the engine never interprets `lsid`'s contents.
pub fn session_key(lsid: &Document) -> SessionKey {
    serde_json::to_vec(lsid).unwrap_or_default()
}

fn required_txn_number(cmd: &Document) -> CommandResult<i64> {
    match cmd.get("txnNumber") {
        Some(Bson::Int64(n)) => Ok(*n),
        Some(Bson::Int32(n)) => Ok(*n as i64),
        Some(other) => Err(CommandError::type_mismatch("long", other.type_name())),
        None => Err(CommandError::bad_value("'txnNumber' is required with 'lsid'")),
    }
}

/// Classifies a non-commit/abort command into its routing decision.
pub fn classify(cmd: &Document) -> CommandResult<Routing> {
    let Some(lsid) = cmd.get("lsid") else {
        return Ok(Routing::NonTransactional);
    };
    let Bson::Document(lsid) = lsid else {
        return Err(CommandError::type_mismatch("object", lsid.type_name()));
    };
    let autocommit = match cmd.get("autocommit") {
        Some(Bson::Boolean(b)) => Some(*b),
        Some(other) => return Err(CommandError::type_mismatch("bool", other.type_name())),
        None => None,
    };
    let start_transaction = match cmd.get("startTransaction") {
        Some(Bson::Boolean(b)) => *b,
        Some(other) => return Err(CommandError::type_mismatch("bool", other.type_name())),
        None => false,
    };

    if autocommit != Some(false) && !start_transaction {
        // A session id without an open multi-statement transaction: the
        // command still runs against the global store.
        return Ok(Routing::NonTransactional);
    }

    let txn_number = required_txn_number(cmd)?;
    let key = session_key(lsid);
    if start_transaction {
        Ok(Routing::StartTransaction { lsid: key, txn_number })
    } else {
        Ok(Routing::InTransaction { lsid: key, txn_number })
    }
}

/// Extracts `(lsid, txnNumber)` for `commitTransaction`/`abortTransaction`,
/// both of which require a session context unconditionally.
pub fn require_session(cmd: &Document) -> CommandResult<(SessionKey, i64)> {
    let lsid = match cmd.get("lsid") {
        Some(Bson::Document(d)) => d,
        Some(other) => return Err(CommandError::type_mismatch("object", other.type_name())),
        None => {
            return Err(CommandError::NoSuchTransaction {
                reason: "'lsid' is required".to_string(),
                label: ErrorLabel::TransientTransactionError,
            })
        }
    };
    let txn_number = required_txn_number(cmd)?;
    Ok((session_key(lsid), txn_number))
}
