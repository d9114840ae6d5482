//! A hashable, totally-ordered wrapper around `_id` values.
//!
//! [`Document`] preserves field order but `Bson` itself has no `Hash`/`Eq`
//! impl (its `Double` variant rules that out). Collections key their
//! documents by this wrapper instead, so lookups by `_id` stay O(1) while
//! insertion order is still tracked by the surrounding `IndexMap`.

use std::hash::{Hash, Hasher};

use docdb_core::Bson;

/// Canonical, hashable form of a document's `_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct BsonKey(pub Bson);

impl BsonKey {
    /// Wraps an `_id` value for use as a map key.
    pub fn new(id: Bson) -> Self {
        BsonKey(id)
    }
}

impl Eq for BsonKey {}

impl Hash for BsonKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Bson::Null => state.write_u8(0),
            Bson::Boolean(b) => {
                state.write_u8(1);
                b.hash(state);
            }
            Bson::Int32(i) => {
                state.write_u8(2);
                (*i as i64).hash(state);
            }
            Bson::Int64(i) => {
                state.write_u8(2);
                i.hash(state);
            }
            Bson::Double(f) => {
                state.write_u8(3);
                f.to_bits().hash(state);
            }
            Bson::String(s) => {
                state.write_u8(4);
                s.hash(state);
            }
            Bson::ObjectId(oid) => {
                state.write_u8(5);
                oid.as_bytes().hash(state);
            }
            other => {
                state.write_u8(9);
                other.to_string().hash(state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int32_and_int64_ids_hash_the_same() {
        use std::collections::hash_map::DefaultHasher;

        fn hash_of(key: &BsonKey) -> u64 {
            let mut h = DefaultHasher::new();
            key.hash(&mut h);
            h.finish()
        }

        let a = BsonKey::new(Bson::Int32(7));
        let b = BsonKey::new(Bson::Int64(7));
        assert_eq!(hash_of(&a), hash_of(&b));
    }
}
