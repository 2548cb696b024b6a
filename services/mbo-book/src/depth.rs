//! Level-2 fallback store
//!
//! Holds aggregated volume per price from the depth subscription. Serves
//! queries only while no order-level data has been applied; readers see
//! the same `OrderView`/`LevelView` shapes either way, with one synthetic
//! order standing in for the whole price.

use std::collections::BTreeMap;

use tracing::debug;
use types::depth::DepthLevel;
use types::numeric::{Price, Volume};
use types::order::Side;

use crate::view::{LevelView, OrderView};

/// Aggregate state at one price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthEntry {
    pub side: Side,
    pub volume: Volume,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default)]
pub struct DepthStore {
    entries: BTreeMap<Price, DepthEntry>,
}

impl DepthStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole store with a full depth snapshot.
    pub fn apply_snapshot(&mut self, levels: &[DepthLevel]) {
        self.entries.clear();
        self.apply_update(levels);
        debug!(prices = self.entries.len(), "Depth snapshot applied");
    }

    /// Upsert changed prices; zero volume removes the price.
    pub fn apply_update(&mut self, levels: &[DepthLevel]) {
        for level in levels {
            if level.volume.is_zero() {
                self.entries.remove(&level.price);
            } else {
                self.entries.insert(
                    level.price,
                    DepthEntry {
                        side: level.side,
                        volume: level.volume,
                        timestamp: level.timestamp,
                    },
                );
            }
        }
    }

    pub fn get(&self, price: Price) -> Option<&DepthEntry> {
        self.entries.get(&price)
    }

    pub fn volume_at(&self, price: Price) -> Volume {
        self.entries
            .get(&price)
            .map(|e| e.volume)
            .unwrap_or(Volume::ZERO)
    }

    /// Highest bid price held.
    pub fn best_bid(&self) -> Option<Price> {
        self.entries
            .iter()
            .rev()
            .find(|(_, e)| e.side == Side::Bid)
            .map(|(p, _)| *p)
    }

    /// Lowest ask price held.
    pub fn best_ask(&self) -> Option<Price> {
        self.entries
            .iter()
            .find(|(_, e)| e.side == Side::Ask)
            .map(|(p, _)| *p)
    }

    /// The single synthetic order standing for this price.
    pub fn orders_at_price(&self, price: Price) -> Option<(Vec<OrderView>, Side)> {
        let entry = self.entries.get(&price)?;
        Some((vec![synthetic_order(price, entry)], entry.side))
    }

    pub fn level_view(&self, price: Price) -> Option<LevelView> {
        let entry = self.entries.get(&price)?;
        Some(LevelView {
            price,
            side: entry.side,
            orders: vec![synthetic_order(price, entry)],
            total_volume: entry.volume,
            remaining_volume: entry.volume,
            filled_volume: Volume::ZERO,
            deleted_volume: Volume::ZERO,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn synthetic_order(price: Price, entry: &DepthEntry) -> OrderView {
    OrderView {
        order_id: None,
        price,
        side: entry.side,
        priority: 0,
        total_volume: entry.volume,
        remaining_volume: entry.volume,
        filled_volume: Volume::ZERO,
        deleted_volume: Volume::ZERO,
        removed: false,
        synthetic: true,
    }
}
