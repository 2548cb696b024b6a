//! Book side and per-order (market-by-order) events
//!
//! One `OrderEvent` is one row of the host's order-level subscription: the
//! venue's latest view of a single resting order.

use crate::ids::OrderId;
use crate::numeric::{Price, Volume};
use serde::{Deserialize, Serialize};

/// Book side of a resting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Resting buy interest
    Bid,
    /// Resting sell interest
    Ask,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

/// Kind of an order-level event as reported by the venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderEventKind {
    /// Order entered the book
    New,
    /// Price, volume or queue position changed
    Change,
    /// Order left the book (cancel or full execution)
    Delete,
    /// Row of a full-book snapshot
    Snapshot,
}

/// A single market-by-order event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: OrderId,
    pub price: Price,
    pub side: Side,
    /// Volume as currently reported by the venue
    pub volume: Volume,
    /// Exchange queue rank; lower rests ahead
    pub priority: u64,
    pub kind: OrderEventKind,
    /// Unix nanos from the venue clock
    pub timestamp: i64,
}

impl OrderEvent {
    /// Whether this event seeds a fresh order (New or Snapshot)
    pub fn is_insert(&self) -> bool {
        matches!(self.kind, OrderEventKind::New | OrderEventKind::Snapshot)
    }
}
