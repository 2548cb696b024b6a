//! Identifier types for feed entities
//!
//! Exchange order identifiers are opaque integers assigned by the venue and
//! stable for the whole life of an order. The same type is used for the
//! aggressor (counter-party) id carried on trade prints.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange-assigned order identifier
///
/// Unique per instrument for the life of the order. Ordering is numeric and
/// only used for deterministic iteration, never for priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(u64);

impl OrderId {
    /// Wrap a raw exchange id
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw exchange id
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for OrderId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id_roundtrip_raw() {
        let id = OrderId::new(42);
        assert_eq!(id.as_u64(), 42);
        assert_eq!(OrderId::from(42), id);
    }

    #[test]
    fn test_order_id_display() {
        assert_eq!(OrderId::new(7).to_string(), "7");
    }

    #[test]
    fn test_order_id_serializes_transparent() {
        let json = serde_json::to_string(&OrderId::new(1234)).unwrap();
        assert_eq!(json, "1234");
    }
}
