//! Order id → current price index
//!
//! The index is how the book notices that a Change row reports a new price
//! for an order it already holds, i.e. that the order migrated between
//! levels without a cancel/re-add.

use std::collections::BTreeMap;

use types::ids::OrderId;
use types::numeric::Price;

#[derive(Debug, Clone, Default)]
pub struct OrderLocationIndex {
    prices: BTreeMap<OrderId, Price>,
}

impl OrderLocationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn price_of(&self, order_id: &OrderId) -> Option<Price> {
        self.prices.get(order_id).copied()
    }

    /// Record the order's current price, returning the previous one.
    pub fn record(&mut self, order_id: OrderId, price: Price) -> Option<Price> {
        self.prices.insert(order_id, price)
    }

    pub fn forget(&mut self, order_id: &OrderId) -> Option<Price> {
        self.prices.remove(order_id)
    }

    /// Forget the order only if it is still indexed at `price`.
    ///
    /// Used when a level drops an order; a newer location recorded by a
    /// later migration must survive.
    pub fn forget_at(&mut self, order_id: &OrderId, price: Price) -> bool {
        if self.prices.get(order_id) == Some(&price) {
            self.prices.remove(order_id);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OrderId, &Price)> {
        self.prices.iter()
    }
}
