//! Read-side copies of book state
//!
//! Everything here is owned data: the render path copies what it needs
//! under the read lock and then works on these values without holding it.

use serde::{Deserialize, Serialize};
use types::ids::OrderId;
use types::numeric::{Price, Volume};
use types::order::Side;

use crate::events::SequenceKey;

/// Which store answered a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Aggregated depth; used until the first order-level event arrives
    Level2,
    /// Per-order book
    Level3,
}

/// One order as seen by a reader.
///
/// Level-2 rows are synthesized as a single order per price with no id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub order_id: Option<OrderId>,
    pub price: Price,
    pub side: Side,
    pub priority: u64,
    pub total_volume: Volume,
    pub remaining_volume: Volume,
    pub filled_volume: Volume,
    pub deleted_volume: Volume,
    /// Flagged for removal; visible until reaped
    pub removed: bool,
    pub synthetic: bool,
}

/// One price level as seen by a reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelView {
    pub price: Price,
    pub side: Side,
    /// Queue priority order
    pub orders: Vec<OrderView>,
    pub total_volume: Volume,
    pub remaining_volume: Volume,
    pub filled_volume: Volume,
    pub deleted_volume: Volume,
}

impl LevelView {
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Whether the row has anything worth drawing.
    pub fn has_content(&self) -> bool {
        !self.orders.is_empty()
    }
}

/// Peak values over a price range, used to scale row widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RangeAggregate {
    pub max_volume: Volume,
    pub max_count: usize,
}

/// Point-in-time copy of the visible price range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSnapshot {
    pub source: DataSource,
    pub last_sequence: Option<SequenceKey>,
    /// Highest price first; prices without content are omitted
    pub levels: Vec<LevelView>,
}

impl RangeSnapshot {
    pub fn level(&self, price: Price) -> Option<&LevelView> {
        self.levels.iter().find(|l| l.price == price)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
