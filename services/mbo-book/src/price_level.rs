//! All orders resting at one price
//!
//! A level is created lazily on the first order placed at its price and is
//! never dropped; an emptied level simply reports zero content. Side is
//! homogeneous: a New/Snapshot row for the opposite side means the venue
//! flipped the price across the spread, so the level is re-seeded.
//!
//! Aggregates are recomputed on demand from the contained orders.

use std::collections::BTreeMap;

use types::ids::OrderId;
use types::numeric::{Price, Volume};
use types::order::{OrderEvent, Side};
use types::trade::TradeEvent;

use crate::events::{NormalizedAction, SequenceKey};
use crate::order::Order;
use crate::view::{LevelView, OrderView};

/// Order ids affected by applying one event to a level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelChange {
    /// Orders newly flagged for removal; the reaper must visit them.
    pub flagged: Vec<OrderId>,
    /// Orders physically dropped from the level (side flip or purge).
    pub evicted: Vec<OrderId>,
}

#[derive(Debug, Clone)]
pub struct PriceLevel {
    price: Price,
    side: Side,
    last_sequence: Option<SequenceKey>,
    orders: BTreeMap<OrderId, Order>,
}

impl PriceLevel {
    pub fn new(price: Price, side: Side) -> Self {
        Self {
            price,
            side,
            last_sequence: None,
            orders: BTreeMap::new(),
        }
    }

    /// Apply one normalized order event.
    pub fn apply_order_event(
        &mut self,
        event: &OrderEvent,
        action: NormalizedAction,
        sequence: SequenceKey,
        grace_cycles: u32,
    ) -> LevelChange {
        self.last_sequence = Some(sequence);
        let mut change = LevelChange::default();

        if action.is_insert() && event.side != self.side {
            change.evicted.extend(self.orders.keys().copied());
            self.orders.clear();
            self.side = event.side;
        }

        match action {
            NormalizedAction::Insert => {
                self.orders.insert(event.order_id, Order::from_event(event));

                let expired: Vec<OrderId> = self
                    .orders
                    .values()
                    .filter(|o| o.is_expired(grace_cycles))
                    .map(Order::order_id)
                    .collect();
                for order_id in expired {
                    self.orders.remove(&order_id);
                    change.evicted.push(order_id);
                }
            }
            NormalizedAction::Update => match self.orders.get_mut(&event.order_id) {
                Some(order) => {
                    if order.apply_order_event(event, action) {
                        change.flagged.push(event.order_id);
                    }
                }
                None => {
                    self.orders.insert(event.order_id, Order::from_event(event));
                }
            },
            NormalizedAction::Remove { .. } => {
                if let Some(order) = self.orders.get_mut(&event.order_id) {
                    if order.apply_order_event(event, action) {
                        change.flagged.push(event.order_id);
                    }
                }
            }
        }

        change
    }

    /// Attribute a trade print to the matching order, if it rests here.
    ///
    /// Returns the id of the order if the print exhausted it.
    pub fn apply_trade_event(&mut self, trade: &TradeEvent, sequence: SequenceKey) -> Option<OrderId> {
        let order_id = trade.order_id?;
        let order = self.orders.get_mut(&order_id)?;
        self.last_sequence = Some(sequence);
        order.apply_trade_event(trade).then_some(order_id)
    }

    /// Detach an order with its full execution history.
    pub fn cut_order(&mut self, order_id: OrderId) -> Option<Order> {
        self.orders.remove(&order_id)
    }

    /// Attach an order cut from another level. Only its price is rewritten.
    pub fn attach_order(&mut self, mut order: Order) {
        order.set_price(self.price);
        self.orders.insert(order.order_id(), order);
    }

    /// Drop an order if it is flagged and its grace period has run out.
    ///
    /// Returns `None` when the order is not here, `Some(false)` while it is
    /// still within its grace period (or live again), `Some(true)` once
    /// purged.
    pub fn reap(&mut self, order_id: OrderId, grace_cycles: u32) -> Option<bool> {
        let order = self.orders.get_mut(&order_id)?;
        if order.advance_grace(grace_cycles) {
            self.orders.remove(&order_id);
            Some(true)
        } else {
            Some(false)
        }
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn last_sequence(&self) -> Option<SequenceKey> {
        self.last_sequence
    }

    pub fn get(&self, order_id: &OrderId) -> Option<&Order> {
        self.orders.get(order_id)
    }

    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.orders.contains_key(order_id)
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Orders not yet flagged for removal.
    pub fn live_order_count(&self) -> usize {
        self.orders.values().filter(|o| !o.is_removed()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn total_volume(&self) -> Volume {
        self.orders.values().map(Order::total_volume).sum()
    }

    pub fn remaining_volume(&self) -> Volume {
        self.orders.values().map(Order::remaining_volume).sum()
    }

    pub fn filled_volume(&self) -> Volume {
        self.orders.values().map(Order::filled_volume).sum()
    }

    pub fn deleted_volume(&self) -> Volume {
        self.orders.values().map(Order::deleted_volume).sum()
    }

    /// Remaining volume of orders not flagged for removal.
    pub fn resting_volume(&self) -> Volume {
        self.orders
            .values()
            .filter(|o| !o.is_removed())
            .map(Order::remaining_volume)
            .sum()
    }

    /// Orders in queue priority order (ties broken by id).
    pub fn orders_by_priority(&self) -> Vec<&Order> {
        let mut orders: Vec<&Order> = self.orders.values().collect();
        orders.sort_by_key(|o| (o.priority(), o.order_id()));
        orders
    }

    pub(crate) fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn order_views(&self) -> Vec<OrderView> {
        self.orders_by_priority()
            .into_iter()
            .map(Order::to_view)
            .collect()
    }

    pub fn to_view(&self) -> LevelView {
        LevelView {
            price: self.price,
            side: self.side,
            orders: self.order_views(),
            total_volume: self.total_volume(),
            remaining_volume: self.remaining_volume(),
            filled_volume: self.filled_volume(),
            deleted_volume: self.deleted_volume(),
        }
    }
}
