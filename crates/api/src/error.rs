//! Facade-level error type (§7 "Error Passthrough").
//!
//! [`docdb_engine::Dispatcher::dispatch`] already maps every engine failure
//! into a wire-level envelope document before it crosses the facade
//! boundary — by the time a typed method here sees it, the original
//! [`docdb_core::CommandError`] no longer exists as a value. [`Error`]
//! reconstructs just enough of it from the envelope's `code`/`codeName`/
//! `errmsg`/`errorLabels` fields for callers to match on, without
//! re-parsing the message string. The teacher's desugaring reference
//! (`desugar.rs`) calls this out directly: "all substrate errors pass
//! through unchanged" — here the equivalent guarantee is that nothing
//! about the envelope is lost in translation.

use docdb_core::{Bson, Document};

/// A failure response from the engine, reconstructed from its envelope.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message} ({code_name}, code {code})")]
pub struct Error {
    /// The wire-level numeric code (`code`).
    pub code: i32,
    /// The wire-level symbolic name (`codeName`).
    pub code_name: String,
    /// The human-readable message (`errmsg`).
    pub message: String,
    /// Transaction error labels, if any (`errorLabels`).
    pub labels: Vec<String>,
}

impl Error {
    /// Parses an error out of a response envelope. Returns `None` if the
    /// envelope reports success (`ok == 1.0`).
    pub fn from_envelope(doc: &Document) -> Option<Self> {
        match doc.get("ok") {
            Some(Bson::Double(ok)) if *ok != 0.0 => return None,
            _ => {}
        }
        let code = match doc.get("code") {
            Some(Bson::Int32(n)) => *n,
            _ => 0,
        };
        let code_name = match doc.get("codeName") {
            Some(Bson::String(s)) => s.clone(),
            _ => String::new(),
        };
        let message = match doc.get("errmsg") {
            Some(Bson::String(s)) => s.clone(),
            _ => String::new(),
        };
        let labels = doc
            .get("errorLabels")
            .and_then(Bson::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| match v {
                        Bson::String(s) => Some(s.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Some(Error { code, code_name, message, labels })
    }

    /// Whether the client should retry the whole transaction from scratch.
    pub fn is_transient_transaction_error(&self) -> bool {
        self.labels.iter().any(|l| l == "TransientTransactionError")
    }

    /// Whether a `commitTransaction` call's outcome is genuinely unknown.
    pub fn is_unknown_commit_result(&self) -> bool {
        self.labels.iter().any(|l| l == "UnknownTransactionCommitResult")
    }
}

/// Result alias for facade operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Turns a response envelope into a `Result`, consuming it on success.
pub fn check(doc: Document) -> Result<Document> {
    match Error::from_envelope(&doc) {
        Some(err) => Err(err),
        None => Ok(doc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_yields_none() {
        let mut doc = Document::new();
        doc.insert("ok", Bson::Double(1.0));
        assert!(Error::from_envelope(&doc).is_none());
    }

    #[test]
    fn failure_envelope_round_trips_fields() {
        let mut doc = Document::new();
        doc.insert("ok", Bson::Double(0.0));
        doc.insert("code", Bson::Int32(11000));
        doc.insert("codeName", Bson::String("DuplicateKey".into()));
        doc.insert("errmsg", Bson::String("duplicate key: _id".into()));
        let err = Error::from_envelope(&doc).unwrap();
        assert_eq!(err.code, 11000);
        assert_eq!(err.code_name, "DuplicateKey");
    }
}
