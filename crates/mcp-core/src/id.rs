//! JSON-RPC request identifiers.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};

/// A JSON-RPC id: either an integer or a string.
///
/// Ids generated by this crate are always [`Id::Number`] (monotonically
/// increasing per origin); [`Id::String`] exists because the wire format
/// allows peers to send string ids inbound (§6 of the design spec).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// Integer id, used for all ids this endpoint originates.
    Number(i64),
    /// String id, accepted from a peer but never generated locally.
    String(String),
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Id {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// Monotonic, per-endpoint id allocator.
///
/// Each endpoint (client or server role) owns one `IdGenerator` for the
/// ids it originates, per the data model's "each endpoint maintains an
/// independent id-space" invariant.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: AtomicI64,
}

impl IdGenerator {
    /// Creates a generator starting at id `0`.
    pub const fn new() -> Self {
        Self {
            next: AtomicI64::new(0),
        }
    }

    /// Allocates the next id, starting at `0` and incrementing by one.
    pub fn next(&self) -> Id {
        Id::Number(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_unique() {
        let gen = IdGenerator::new();
        let ids: Vec<_> = (0..100).map(|_| gen.next()).collect();
        let mut seen = std::collections::HashSet::new();
        for id in ids {
            assert!(seen.insert(id), "id generator produced a duplicate");
        }
    }

    #[test]
    fn number_id_round_trips_through_json() {
        let id = Id::Number(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "42");
        let back: Id = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn string_id_round_trips_through_json() {
        let id = Id::String("abc-123".to_string());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc-123\"");
        let back: Id = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
