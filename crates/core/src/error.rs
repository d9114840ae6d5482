//! Unified error type for the command layer.
//!
//! Every fallible operation in this workspace returns [`CommandError`]. Each
//! variant carries a fixed wire-level `(code, codeName)` pair (§6/§7) and,
//! where relevant, `errorLabels`. The dispatcher's only error-handling job is
//! calling [`CommandError::into_envelope`] once, at the boundary — handlers
//! never format envelopes themselves.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::{Bson, Document};

/// Result alias used throughout the workspace.
pub type CommandResult<T> = Result<T, CommandError>;

/// A wire-level error code/name pair, as returned to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode {
    /// Numeric code (`code` field of the envelope).
    pub code: i32,
    /// Symbolic name (`codeName` field of the envelope).
    pub name: &'static str,
}

impl ErrorCode {
    /// `14 BadValue`.
    pub const BAD_VALUE: ErrorCode = ErrorCode { code: 14, name: "BadValue" };
    /// `14 TypeMismatch` — shares a numeric code with `BadValue`.
    pub const TYPE_MISMATCH: ErrorCode = ErrorCode { code: 14, name: "TypeMismatch" };
    /// `43 CursorNotFound`.
    pub const CURSOR_NOT_FOUND: ErrorCode = ErrorCode { code: 43, name: "CursorNotFound" };
    /// `59 CommandNotFound`.
    pub const COMMAND_NOT_FOUND: ErrorCode = ErrorCode { code: 59, name: "CommandNotFound" };
    /// `112 WriteConflict`.
    pub const WRITE_CONFLICT: ErrorCode = ErrorCode { code: 112, name: "WriteConflict" };
    /// `238 NotImplemented`.
    pub const NOT_IMPLEMENTED: ErrorCode = ErrorCode { code: 238, name: "NotImplemented" };
    /// `251 NoSuchTransaction`.
    pub const NO_SUCH_TRANSACTION: ErrorCode = ErrorCode { code: 251, name: "NoSuchTransaction" };
    /// `256 TransactionCommitted`.
    pub const TRANSACTION_COMMITTED: ErrorCode = ErrorCode { code: 256, name: "TransactionCommitted" };
    /// `11000 DuplicateKey`.
    pub const DUPLICATE_KEY: ErrorCode = ErrorCode { code: 11000, name: "DuplicateKey" };
}

/// A transaction error label, surfaced in the envelope's `errorLabels` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorLabel {
    /// Tells the client the whole transaction should be retried from scratch.
    TransientTransactionError,
    /// The commit may or may not have applied; the client must not blindly retry.
    UnknownTransactionCommitResult,
    /// The requested behavior isn't supported by this engine.
    UnsupportedFeature,
}

impl ErrorLabel {
    /// The literal string sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorLabel::TransientTransactionError => "TransientTransactionError",
            ErrorLabel::UnknownTransactionCommitResult => "UnknownTransactionCommitResult",
            ErrorLabel::UnsupportedFeature => "UnsupportedFeature",
        }
    }
}

/// All errors that can occur while dispatching and executing a command.
///
/// # Categories
///
/// | Category | Variants | Description |
/// |----------|----------|-------------|
/// | Schema | `BadValue`, `TypeMismatch` | malformed or mistyped command shape |
/// | Dispatch | `CommandNotFound` | unregistered command name |
/// | Data | `DuplicateKey` | unique-index violation |
/// | Concurrency | `WriteConflict` | conflicting concurrent write |
/// | Feature gap | `NotImplemented` | engine cannot serve the request |
/// | Transaction | `NoSuchTransaction`, `TransactionAlreadyCommitted`, `TransactionInProgress` | session/transaction state errors |
/// | Cursor | `CursorNotFound` | unknown cursor id or namespace mismatch |
/// | System | `Internal` | invariant violation / unexpected exception |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum CommandError {
    /// Malformed argument shape.
    #[error("{reason}")]
    BadValue {
        /// Description of what was wrong.
        reason: String,
    },

    /// A field had the wrong BSON type.
    #[error("wrong type: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type name.
        expected: String,
        /// Actual type name found.
        actual: String,
    },

    /// The first key of the command document did not match any registered handler.
    #[error("no such command: '{command}'")]
    CommandNotFound {
        /// The unrecognized command name.
        command: String,
    },

    /// A unique-index constraint was violated.
    #[error("duplicate key: {reason}")]
    DuplicateKey {
        /// Description of the violated constraint.
        reason: String,
    },

    /// A concurrent write conflicted with this one.
    #[error("write conflict: {reason}")]
    WriteConflict {
        /// Description of the conflict.
        reason: String,
    },

    /// The engine does not support the requested behavior.
    #[error("not implemented: {reason}")]
    NotImplemented {
        /// Description of the unsupported feature.
        reason: String,
    },

    /// No transaction is active for the given session, or it was already
    /// resolved (committed/aborted) and the slot has been cleared.
    #[error("no such transaction: {reason}")]
    NoSuchTransaction {
        /// Description, e.g. stale txnNumber or unknown session.
        reason: String,
        /// Label to attach to the envelope.
        label: ErrorLabel,
    },

    /// `commitTransaction` was called again after it already succeeded.
    #[error("transaction already committed")]
    TransactionAlreadyCommitted,

    /// `startTransaction` was requested while a transaction is already open
    /// for this session.
    #[error("transaction already in progress for this session")]
    TransactionInProgress,

    /// The referenced cursor id does not exist, or its namespace does not
    /// match the one in the request.
    #[error("cursor not found: {cursor_id}")]
    CursorNotFound {
        /// The unresolved cursor id.
        cursor_id: i64,
    },

    /// Invariant violation or unexpected internal failure.
    #[error("internal error: {reason}")]
    Internal {
        /// Description of the failure.
        reason: String,
    },
}

impl CommandError {
    /// Convenience constructor for [`CommandError::BadValue`].
    pub fn bad_value(reason: impl Into<String>) -> Self {
        CommandError::BadValue { reason: reason.into() }
    }

    /// Convenience constructor for [`CommandError::TypeMismatch`].
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        CommandError::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Convenience constructor for [`CommandError::NotImplemented`].
    pub fn not_implemented(reason: impl Into<String>) -> Self {
        CommandError::NotImplemented { reason: reason.into() }
    }

    /// Whether this error represents a transient condition the client should
    /// retry the whole transaction for.
    pub fn is_transaction_error(&self) -> bool {
        matches!(
            self,
            CommandError::NoSuchTransaction { .. }
                | CommandError::TransactionAlreadyCommitted
                | CommandError::TransactionInProgress
        )
    }

    /// The wire-level `(code, codeName)` pair for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            CommandError::BadValue { .. } => ErrorCode::BAD_VALUE,
            CommandError::TypeMismatch { .. } => ErrorCode::TYPE_MISMATCH,
            CommandError::CommandNotFound { .. } => ErrorCode::COMMAND_NOT_FOUND,
            CommandError::DuplicateKey { .. } => ErrorCode::DUPLICATE_KEY,
            CommandError::WriteConflict { .. } => ErrorCode::WRITE_CONFLICT,
            CommandError::NotImplemented { .. } => ErrorCode::NOT_IMPLEMENTED,
            CommandError::NoSuchTransaction { .. } => ErrorCode::NO_SUCH_TRANSACTION,
            CommandError::TransactionAlreadyCommitted => ErrorCode::TRANSACTION_COMMITTED,
            CommandError::TransactionInProgress => ErrorCode::BAD_VALUE,
            CommandError::CursorNotFound { .. } => ErrorCode::CURSOR_NOT_FOUND,
            CommandError::Internal { .. } => ErrorCode::BAD_VALUE,
        }
    }

    /// Error labels to attach to the envelope, if any (§4.5, §6).
    pub fn error_labels(&self) -> Vec<ErrorLabel> {
        match self {
            CommandError::NoSuchTransaction { label, .. } => vec![*label],
            CommandError::NotImplemented { .. } => vec![ErrorLabel::UnsupportedFeature],
            _ => Vec::new(),
        }
    }

    /// Builds the canonical failure envelope document (§6):
    /// `{ok: 0.0, errmsg, code, codeName, errorLabels?}`.
    pub fn into_envelope(self) -> Document {
        let code = self.error_code();
        let labels = self.error_labels();
        let mut doc = Document::new();
        doc.insert("ok", Bson::Double(0.0));
        doc.insert("errmsg", Bson::String(self.to_string()));
        doc.insert("code", Bson::Int32(code.code));
        doc.insert("codeName", Bson::String(code.name.to_string()));
        if !labels.is_empty() {
            let arr = labels
                .into_iter()
                .map(|l| Bson::String(l.as_str().to_string()))
                .collect();
            doc.insert("errorLabels", Bson::Array(arr));
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_not_found_maps_to_code_59() {
        let err = CommandError::CommandNotFound { command: "bogus".into() };
        assert_eq!(err.error_code(), ErrorCode::COMMAND_NOT_FOUND);
        let env = err.into_envelope();
        assert_eq!(env.get("ok"), Some(&Bson::Double(0.0)));
        assert_eq!(env.get("code"), Some(&Bson::Int32(59)));
        assert_eq!(
            env.get("codeName"),
            Some(&Bson::String("CommandNotFound".into()))
        );
    }

    #[test]
    fn not_implemented_carries_unsupported_feature_label() {
        let err = CommandError::not_implemented("collation on distinct");
        let env = err.into_envelope();
        let labels = env.get("errorLabels").and_then(Bson::as_array).unwrap();
        assert_eq!(labels, &[Bson::String("UnsupportedFeature".into())]);
    }

    #[test]
    fn no_such_transaction_carries_the_given_label() {
        let err = CommandError::NoSuchTransaction {
            reason: "stale txnNumber".into(),
            label: ErrorLabel::TransientTransactionError,
        };
        assert!(err.is_transaction_error());
        let env = err.into_envelope();
        assert_eq!(env.get("code"), Some(&Bson::Int32(251)));
        let labels = env.get("errorLabels").and_then(Bson::as_array).unwrap();
        assert_eq!(labels, &[Bson::String("TransientTransactionError".into())]);
    }

    #[test]
    fn duplicate_key_maps_to_11000() {
        let err = CommandError::DuplicateKey { reason: "_id: 1".into() };
        assert_eq!(err.error_code().code, 11000);
    }
}
