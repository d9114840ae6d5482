//! 12-byte document identifiers.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

static COUNTER: AtomicU32 = AtomicU32::new(0);

/// A 12-byte identifier: 4-byte timestamp, 5-byte random process identity,
/// 3-byte monotonic counter — generated the same shape as a driver-assigned
/// `_id`, though nothing here requires documents to use it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Generates a new identifier from the current time, a random process
    /// tag, and a monotonic counter (wrapping at 2^24, matching the 3-byte
    /// counter field).
    pub fn new() -> Self {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as u32;

        let process_tag = uuid::Uuid::new_v4();
        let process_bytes = process_tag.as_bytes();

        let count = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00FF_FFFF;

        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&process_bytes[0..5]);
        bytes[9..12].copy_from_slice(&count.to_be_bytes()[1..4]);
        Self(bytes)
    }

    /// Builds an identifier from raw bytes (e.g. parsed from the wire).
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Lowercase hex representation, the conventional textual form.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parses a 24-character hex string back into an identifier.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 24 {
            return None;
        }
        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId(\"{}\")", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn hex_round_trips_through_display() {
        let id = ObjectId::new();
        assert_eq!(id.to_hex().len(), 24);
        assert_eq!(format!("{id}"), id.to_hex());
    }

    #[test]
    fn from_hex_inverts_to_hex() {
        let id = ObjectId::new();
        assert_eq!(ObjectId::from_hex(&id.to_hex()), Some(id));
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        assert_eq!(ObjectId::from_hex("abc"), None);
    }
}
