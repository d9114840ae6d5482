//! Shared option validators and canonicalizer (§4.2 "Per-command handlers").
//!
//! Handlers validate in the fixed order the spec lays out: target shape,
//! then these shared option schemas, then the command's own shape. Every
//! function here either returns the canonical value or a typed
//! `BadValue`/`TypeMismatch` — handlers never build those envelopes by hand.

use docdb_core::{Bson, CommandError, CommandResult, Document};

use crate::config::DatabaseConfig;

/// The collection name a command targets: the value of its first key.
pub fn target_collection(cmd: &Document) -> CommandResult<String> {
    let name = cmd.first_key().ok_or_else(|| CommandError::bad_value("empty command"))?;
    match cmd.get(name) {
        Some(Bson::String(s)) => Ok(s.clone()),
        Some(other) => Err(CommandError::type_mismatch("string", other.type_name())),
        None => Err(CommandError::bad_value("missing command target")),
    }
}

/// The database this command runs against: `$db`, or the configured default.
pub fn database_name<'a>(cmd: &'a Document, config: &'a DatabaseConfig) -> &'a str {
    match cmd.get("$db") {
        Some(Bson::String(s)) => s.as_str(),
        _ => config.default_database(),
    }
}

/// Reads a required document-typed field.
pub fn required_document<'a>(cmd: &'a Document, field: &str) -> CommandResult<&'a Document> {
    match cmd.get(field) {
        Some(Bson::Document(d)) => Ok(d),
        Some(other) => Err(CommandError::type_mismatch("object", other.type_name())),
        None => Err(CommandError::bad_value(format!("'{field}' is required"))),
    }
}

/// Reads an optional document-typed field, type-checking it if present.
pub fn optional_document<'a>(cmd: &'a Document, field: &str) -> CommandResult<Option<&'a Document>> {
    match cmd.get(field) {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::Document(d)) => Ok(Some(d)),
        Some(other) => Err(CommandError::type_mismatch("object", other.type_name())),
    }
}

/// Reads a required array-typed field.
pub fn required_array<'a>(cmd: &'a Document, field: &str) -> CommandResult<&'a [Bson]> {
    match cmd.get(field) {
        Some(Bson::Array(a)) => Ok(a),
        Some(other) => Err(CommandError::type_mismatch("array", other.type_name())),
        None => Err(CommandError::bad_value(format!("'{field}' is required"))),
    }
}

/// Reads an optional array-typed field, type-checking it if present.
pub fn optional_array<'a>(cmd: &'a Document, field: &str) -> CommandResult<Option<&'a [Bson]>> {
    match cmd.get(field) {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::Array(a)) => Ok(Some(a)),
        Some(other) => Err(CommandError::type_mismatch("array", other.type_name())),
    }
}

/// Reads a boolean field, defaulting when absent.
pub fn bool_field(cmd: &Document, field: &str, default: bool) -> CommandResult<bool> {
    match cmd.get(field) {
        None | Some(Bson::Null) => Ok(default),
        Some(Bson::Boolean(b)) => Ok(*b),
        Some(other) => Err(CommandError::type_mismatch("bool", other.type_name())),
    }
}

/// Reads an integer field (`int32` or `int64`) as `i64`.
pub fn int_field(cmd: &Document, field: &str) -> CommandResult<Option<i64>> {
    match cmd.get(field) {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::Int32(i)) => Ok(Some(*i as i64)),
        Some(Bson::Int64(i)) => Ok(Some(*i)),
        Some(other) => Err(CommandError::type_mismatch("int", other.type_name())),
    }
}

/// Reads `batchSize`/`limit`-style field as a non-negative `usize`, falling
/// back to `default` when absent.
pub fn usize_field(cmd: &Document, field: &str, default: usize) -> CommandResult<usize> {
    match int_field(cmd, field)? {
        None => Ok(default),
        Some(n) if n >= 0 => Ok(n as usize),
        Some(n) => Err(CommandError::bad_value(format!("'{field}' must be non-negative, got {n}"))),
    }
}

/// Validates the option fields every handler accepts but most ignore the
/// finer semantics of: `ordered`, `writeConcern`, `readConcern`, `hint`,
/// `collation` must have the right shape if present, nothing more (§4.2).
pub fn validate_shared_options(cmd: &Document) -> CommandResult<()> {
    let _ = bool_field(cmd, "ordered", true)?;
    let _ = optional_document(cmd, "writeConcern")?;
    let _ = optional_document(cmd, "readConcern")?;
    match cmd.get("hint") {
        None | Some(Bson::Null) | Some(Bson::String(_)) | Some(Bson::Document(_)) => {}
        Some(other) => return Err(CommandError::type_mismatch("string or object", other.type_name())),
    }
    let _ = optional_document(cmd, "collation")?;
    // maxTimeMS is parsed for shape validation only; the in-memory engine
    // has no long-running operations to bound by it.
    let _ = int_field(cmd, "maxTimeMS")?;
    Ok(())
}

/// `findAndModify`/`findOneAndUpdate`/`findOneAndReplace`'s return-document
/// selection, normalized from either spelling (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnDocument {
    /// Return the document as it looked before the modification.
    Before,
    /// Return the document as it looks after the modification.
    After,
}

impl ReturnDocument {
    /// Reads `returnDocument` (`"before"`/`"after"`) or the legacy boolean
    /// `new`, defaulting to `Before` when neither is present.
    pub fn parse(cmd: &Document) -> CommandResult<Self> {
        if let Some(value) = cmd.get("returnDocument") {
            return match value {
                Bson::String(s) if s.eq_ignore_ascii_case("after") => Ok(ReturnDocument::After),
                Bson::String(s) if s.eq_ignore_ascii_case("before") => Ok(ReturnDocument::Before),
                Bson::String(other) => Err(CommandError::bad_value(format!(
                    "unrecognized returnDocument '{other}'"
                ))),
                other => Err(CommandError::type_mismatch("string", other.type_name())),
            };
        }
        match cmd.get("new") {
            Some(Bson::Boolean(true)) => Ok(ReturnDocument::After),
            Some(Bson::Boolean(false)) | None => Ok(ReturnDocument::Before),
            Some(other) => Err(CommandError::type_mismatch("bool", other.type_name())),
        }
    }
}

/// Whether an update document is operator-style (`$set`, …) vs. a full
/// replacement document (§4.2).
pub fn is_operator_update(update: &Document) -> bool {
    update.keys().next().is_some_and(|k| k.starts_with('$'))
}
