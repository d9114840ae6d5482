//! Namespace identifiers: `"<database>.<collection>"`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A fully-qualified collection reference, `"<database>.<collection>"`.
///
/// Compared and hashed structurally, so it can key the collection map inside
/// a [`crate::traits::CommandStore`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace {
    database: String,
    collection: String,
}

impl Namespace {
    /// Builds a namespace from a database and collection name.
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }

    /// The database component.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// The collection component.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The `"db.coll"` string used on the wire (§3, §6).
    pub fn as_wire_string(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire_string())
    }
}

/// The database used when a command omits `$db` (§4.3).
pub const DEFAULT_DATABASE: &str = "test";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_string_joins_database_and_collection_with_a_dot() {
        let ns = Namespace::new("test", "users");
        assert_eq!(ns.as_wire_string(), "test.users");
        assert_eq!(format!("{ns}"), "test.users");
    }
}
