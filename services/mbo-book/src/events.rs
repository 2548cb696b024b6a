//! Update batches and event normalization
//!
//! Producers hand the applier `UpdateBatch`es: a sequence key plus whatever
//! order, trade and depth events arrived together. Before dispatch, every
//! order event is reduced to a `NormalizedAction` so that the order and level
//! state machines switch on a closed set of transitions and never have to
//! reinterpret the raw venue kind.

use std::fmt;

use serde::{Deserialize, Serialize};
use types::depth::DepthLevel;
use types::numeric::Volume;
use types::order::{OrderEvent, OrderEventKind};
use types::trade::TradeEvent;

/// Monotonic batch identifier used for duplicate detection.
///
/// Derived either from arrival time (see `UpdateSender`) or from an explicit
/// external counter supplied by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceKey(u64);

impl SequenceKey {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SequenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Level-2 payload carried by a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "levels", rename_all = "snake_case")]
pub enum DepthBatch {
    /// Full aggregated book; replaces everything held so far
    Snapshot(Vec<DepthLevel>),
    /// Changed prices only; zero volume removes the price
    Incremental(Vec<DepthLevel>),
}

/// One unit of work for the applier.
///
/// Effects of a batch are atomic with respect to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBatch {
    pub sequence_key: SequenceKey,
    #[serde(default)]
    pub orders: Vec<OrderEvent>,
    #[serde(default)]
    pub trades: Vec<TradeEvent>,
    #[serde(default)]
    pub depth: Option<DepthBatch>,
}

impl UpdateBatch {
    pub fn orders(sequence_key: SequenceKey, orders: Vec<OrderEvent>) -> Self {
        Self {
            sequence_key,
            orders,
            trades: Vec::new(),
            depth: None,
        }
    }

    pub fn trades(sequence_key: SequenceKey, trades: Vec<TradeEvent>) -> Self {
        Self {
            sequence_key,
            orders: Vec::new(),
            trades,
            depth: None,
        }
    }

    pub fn depth(sequence_key: SequenceKey, depth: DepthBatch) -> Self {
        Self {
            sequence_key,
            orders: Vec::new(),
            trades: Vec::new(),
            depth: Some(depth),
        }
    }

    pub fn has_orders(&self) -> bool {
        !self.orders.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty() && self.trades.is_empty() && self.depth.is_none()
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match (self.has_orders(), !self.trades.is_empty(), self.depth.is_some()) {
            (true, false, false) => "orders",
            (false, true, false) => "trades",
            (false, false, true) => "depth",
            (false, false, false) => "empty",
            _ => "mixed",
        }
    }
}

/// Transition an order event requests, independent of the raw venue kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizedAction {
    /// New or Snapshot row: the order is seeded from scratch.
    Insert,
    /// Change with a live volume: merged into the existing order.
    Update,
    /// Delete, or any other kind reporting zero volume.
    ///
    /// `disclosed` holds the venue-reported partial-delete amount.
    Remove { disclosed: Option<Volume> },
}

impl NormalizedAction {
    /// Reduce a raw event to its action.
    ///
    /// Zero-volume New/Change/Snapshot rows become removals without a
    /// disclosed amount.
    pub fn of(event: &OrderEvent) -> Self {
        match event.kind {
            OrderEventKind::Delete => NormalizedAction::Remove {
                disclosed: (!event.volume.is_zero()).then_some(event.volume),
            },
            _ if event.volume.is_zero() => NormalizedAction::Remove { disclosed: None },
            OrderEventKind::New | OrderEventKind::Snapshot => NormalizedAction::Insert,
            OrderEventKind::Change => NormalizedAction::Update,
        }
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, NormalizedAction::Remove { .. })
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, NormalizedAction::Insert)
    }
}
