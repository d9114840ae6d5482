//! The document value tree.
//!
//! [`Bson`] is the self-describing value every command, filter, and stored
//! document is built from. [`Document`] is the ordered-key mapping used at
//! every level of a value tree: key order is insertion order, matching the
//! first key's position even when a later `insert` overwrites its value.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::object_id::ObjectId;

/// BSON-style binary subtype, kept alongside the raw bytes.
pub type BinarySubtype = u8;

/// Binary data with a subtype tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binary {
    /// Subtype byte (0x00 = generic, matching the BSON convention).
    pub subtype: BinarySubtype,
    /// Raw bytes.
    pub bytes: Vec<u8>,
}

/// A BSON-style internal timestamp: `(seconds, increment)`, distinct from
/// [`DateTime`] — used for things like oplog-style ordering, not wall time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    /// Seconds since the Unix epoch.
    pub seconds: u32,
    /// Monotonic counter within the same second.
    pub increment: u32,
}

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateTime(pub i64);

/// A 128-bit decimal, stored as its high/low bits rather than interpreted.
///
/// The core treats decimals as opaque comparable payloads; no arithmetic is
/// implemented on them since no handler performs decimal math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decimal128 {
    /// High 64 bits.
    pub high: u64,
    /// Low 64 bits.
    pub low: u64,
}

/// An ordered document: a mapping from string keys to [`Bson`] values where
/// keys are unique per level and the first-insertion order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: IndexMap<String, Bson>,
}

impl Document {
    /// An empty document.
    pub fn new() -> Self {
        Self {
            fields: IndexMap::new(),
        }
    }

    /// Builds a document from an ordered list of key/value pairs.
    pub fn from_pairs<I: IntoIterator<Item = (String, Bson)>>(pairs: I) -> Self {
        let mut fields = IndexMap::new();
        for (k, v) in pairs {
            fields.insert(k, v);
        }
        Self { fields }
    }

    /// Inserts a key, preserving its original position if already present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Bson>) -> Option<Bson> {
        self.fields.insert(key.into(), value.into())
    }

    /// Looks up a field by key.
    pub fn get(&self, key: &str) -> Option<&Bson> {
        self.fields.get(key)
    }

    /// Looks up a field by key, mutably.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Bson> {
        self.fields.get_mut(key)
    }

    /// Removes a field, returning its value if present.
    pub fn remove(&mut self, key: &str) -> Option<Bson> {
        self.fields.shift_remove(key)
    }

    /// Whether the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of top-level fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// The first key in insertion order — the command name for a command document.
    pub fn first_key(&self) -> Option<&str> {
        self.fields.keys().next().map(String::as_str)
    }

    /// Iterates fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Bson)> {
        self.fields.iter()
    }

    /// Iterates keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    /// Whether a key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }
}

impl FromIterator<(String, Bson)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Bson)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

impl IntoIterator for Document {
    type Item = (String, Bson);
    type IntoIter = indexmap::map::IntoIter<String, Bson>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// The self-describing value tree: every document field, array element, and
/// command argument is one of these variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Bson {
    /// Absence of a value.
    Null,
    /// Boolean.
    Boolean(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// IEEE-754 double.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// 128-bit decimal.
    Decimal128(Decimal128),
    /// Binary payload with subtype.
    Binary(Binary),
    /// Internal oplog-style timestamp.
    Timestamp(Timestamp),
    /// Wall-clock datetime.
    DateTime(DateTime),
    /// Unique document identifier.
    ObjectId(ObjectId),
    /// Ordered nested document.
    Document(Document),
    /// Ordered sequence of values.
    Array(Vec<Bson>),
}

impl Bson {
    /// The BSON-style type name, used in type-mismatch error messages and by
    /// `distinct`'s `(bsonType, value)` deduplication key.
    pub fn type_name(&self) -> &'static str {
        match self {
            Bson::Null => "null",
            Bson::Boolean(_) => "bool",
            Bson::Int32(_) => "int",
            Bson::Int64(_) => "long",
            Bson::Double(_) => "double",
            Bson::String(_) => "string",
            Bson::Decimal128(_) => "decimal",
            Bson::Binary(_) => "binData",
            Bson::Timestamp(_) => "timestamp",
            Bson::DateTime(_) => "date",
            Bson::ObjectId(_) => "objectId",
            Bson::Document(_) => "object",
            Bson::Array(_) => "array",
        }
    }

    /// Borrows the inner document, if this is a `Document` variant.
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Bson::Document(d) => Some(d),
            _ => None,
        }
    }

    /// Mutably borrows the inner document, if this is a `Document` variant.
    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Bson::Document(d) => Some(d),
            _ => None,
        }
    }

    /// Borrows the inner array, if this is an `Array` variant.
    pub fn as_array(&self) -> Option<&[Bson]> {
        match self {
            Bson::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Borrows the inner string, if this is a `String` variant.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Bson::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrows the inner bool, if this is a `Boolean` variant.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Bson::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Widens any numeric variant to `f64`, for arithmetic update operators.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Bson::Int32(i) => Some(*i as f64),
            Bson::Int64(i) => Some(*i as f64),
            Bson::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Whether this value begins a top-level key starting with `$` — used to
    /// distinguish operator-style from replacement-style update documents.
    pub fn is_operator_document(&self) -> bool {
        match self {
            Bson::Document(d) => d.keys().next().is_some_and(|k| k.starts_with('$')),
            _ => false,
        }
    }
}

impl From<bool> for Bson {
    fn from(v: bool) -> Self {
        Bson::Boolean(v)
    }
}

impl From<i32> for Bson {
    fn from(v: i32) -> Self {
        Bson::Int32(v)
    }
}

impl From<i64> for Bson {
    fn from(v: i64) -> Self {
        Bson::Int64(v)
    }
}

impl From<f64> for Bson {
    fn from(v: f64) -> Self {
        Bson::Double(v)
    }
}

impl From<String> for Bson {
    fn from(v: String) -> Self {
        Bson::String(v)
    }
}

impl From<&str> for Bson {
    fn from(v: &str) -> Self {
        Bson::String(v.to_string())
    }
}

impl From<Document> for Bson {
    fn from(v: Document) -> Self {
        Bson::Document(v)
    }
}

impl From<Vec<Bson>> for Bson {
    fn from(v: Vec<Bson>) -> Self {
        Bson::Array(v)
    }
}

impl fmt::Display for Bson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bson::Null => write!(f, "null"),
            Bson::Boolean(b) => write!(f, "{b}"),
            Bson::Int32(i) => write!(f, "{i}"),
            Bson::Int64(i) => write!(f, "{i}"),
            Bson::Double(d) => write!(f, "{d}"),
            Bson::String(s) => write!(f, "{s:?}"),
            Bson::Decimal128 { .. } => write!(f, "<decimal128>"),
            Bson::Binary(b) => write!(f, "<binary subtype={} len={}>", b.subtype, b.bytes.len()),
            Bson::Timestamp(ts) => write!(f, "Timestamp({}, {})", ts.seconds, ts.increment),
            Bson::DateTime(dt) => write!(f, "DateTime({})", dt.0),
            Bson::ObjectId(id) => write!(f, "ObjectId({id})"),
            Bson::Document(_) => write!(f, "<document>"),
            Bson::Array(_) => write!(f, "<array>"),
        }
    }
}
