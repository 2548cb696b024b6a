//! Per-order state tracked inside a price level
//!
//! An `Order` is the book's view of one exchange order: its last reported
//! attributes, the executions attributed to it, and its removal flag.
//! Removal is deferred: a flagged order stays visible until the reaper has
//! advanced its grace counter past the configured threshold.

use std::collections::BTreeMap;

use types::ids::OrderId;
use types::numeric::{Price, Volume};
use types::order::{OrderEvent, Side};
use types::trade::TradeEvent;

use crate::events::NormalizedAction;
use crate::view::OrderView;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    order_id: OrderId,
    price: Price,
    side: Side,
    priority: u64,
    /// Total volume as last reported, including what has since traded.
    total_volume: Volume,
    /// Executions keyed by aggressor id. Replays overwrite.
    executions: BTreeMap<OrderId, Volume>,
    removed: bool,
    grace: u32,
    deleted: Option<Volume>,
}

impl Order {
    /// Seed a fresh order from a New/Snapshot row.
    pub fn from_event(event: &OrderEvent) -> Self {
        let mut order = Self {
            order_id: event.order_id,
            price: event.price,
            side: event.side,
            priority: event.priority,
            total_volume: event.volume,
            executions: BTreeMap::new(),
            removed: false,
            grace: 0,
            deleted: None,
        };
        if let NormalizedAction::Remove { disclosed } = NormalizedAction::of(event) {
            order.mark_deleted(disclosed);
        }
        order
    }

    /// Merge an order-level event. Returns true if this event flagged the
    /// order for removal.
    pub fn apply_order_event(&mut self, event: &OrderEvent, action: NormalizedAction) -> bool {
        match action {
            NormalizedAction::Remove { disclosed } => self.mark_deleted(disclosed),
            NormalizedAction::Insert | NormalizedAction::Update => {
                if event.priority != self.priority {
                    // Requeued at the venue: the reported volume is what is
                    // left, so the fills recorded so far stay on top of it.
                    self.priority = event.priority;
                    self.price = event.price;
                    self.total_volume = self.filled_volume() + event.volume;
                } else {
                    self.price = event.price;
                    self.total_volume = event.volume;
                }
                self.side = event.side;

                if self.remaining_volume().is_zero() {
                    self.mark_removed()
                } else {
                    false
                }
            }
        }
    }

    /// Record an execution against this order. Returns true if the
    /// execution exhausted the order and flagged it.
    ///
    /// Prints without both the resting and aggressor ids are ignored.
    pub fn apply_trade_event(&mut self, trade: &TradeEvent) -> bool {
        let Some((order_id, aggressor)) = trade.attribution() else {
            return false;
        };
        if order_id != self.order_id {
            return false;
        }

        self.executions.insert(aggressor, trade.volume);

        if self.remaining_volume().is_zero() {
            self.mark_removed()
        } else {
            false
        }
    }

    /// Advance the grace counter by one reap cycle.
    ///
    /// Returns true once the order is flagged and has already waited
    /// `grace_cycles` cycles; otherwise counts this cycle and returns false.
    pub fn advance_grace(&mut self, grace_cycles: u32) -> bool {
        if !self.removed {
            return false;
        }
        if self.grace >= grace_cycles {
            return true;
        }
        self.grace += 1;
        false
    }

    /// Non-mutating form of `advance_grace`.
    pub fn is_expired(&self, grace_cycles: u32) -> bool {
        self.removed && self.grace >= grace_cycles
    }

    fn mark_deleted(&mut self, disclosed: Option<Volume>) -> bool {
        match disclosed {
            Some(volume) => self.deleted = Some(volume),
            None if self.deleted.is_none() => self.deleted = Some(self.remaining_volume()),
            None => {}
        }
        self.mark_removed()
    }

    fn mark_removed(&mut self) -> bool {
        if self.removed {
            return false;
        }
        self.removed = true;
        self.grace = 0;
        true
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn priority(&self) -> u64 {
        self.priority
    }

    pub fn total_volume(&self) -> Volume {
        self.total_volume
    }

    pub fn filled_volume(&self) -> Volume {
        self.executions.values().copied().sum()
    }

    pub fn remaining_volume(&self) -> Volume {
        self.total_volume.saturating_sub(self.filled_volume())
    }

    /// Volume withdrawn by a delete, or zero while the order is live.
    pub fn deleted_volume(&self) -> Volume {
        self.deleted.unwrap_or(Volume::ZERO)
    }

    pub fn execution_count(&self) -> usize {
        self.executions.len()
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub(crate) fn set_price(&mut self, price: Price) {
        self.price = price;
    }

    pub fn to_view(&self) -> OrderView {
        OrderView {
            order_id: Some(self.order_id),
            price: self.price,
            side: self.side,
            priority: self.priority,
            total_volume: self.total_volume,
            remaining_volume: self.remaining_volume(),
            filled_volume: self.filled_volume(),
            deleted_volume: self.deleted_volume(),
            removed: self.removed,
            synthetic: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::order::OrderEventKind;

    fn row(kind: OrderEventKind, volume: u64, priority: u64) -> OrderEvent {
        OrderEvent {
            order_id: OrderId::new(1),
            price: Price::from_u64(100),
            side: Side::Bid,
            volume: Volume::from_u64(volume),
            priority,
            kind,
            timestamp: 0,
        }
    }

    fn fill(aggressor: u64, volume: u64) -> TradeEvent {
        TradeEvent {
            price: Price::from_u64(100),
            volume: Volume::from_u64(volume),
            order_id: Some(OrderId::new(1)),
            aggressor_order_id: Some(OrderId::new(aggressor)),
            side: Side::Ask,
            timestamp: 0,
        }
    }

    fn apply(order: &mut Order, event: &OrderEvent) -> bool {
        order.apply_order_event(event, NormalizedAction::of(event))
    }

    #[test]
    fn test_partial_fill_accounting() {
        let mut order = Order::from_event(&row(OrderEventKind::Snapshot, 10, 1));
        assert!(!order.apply_trade_event(&fill(99, 4)));

        assert_eq!(order.filled_volume(), Volume::from_u64(4));
        assert_eq!(order.remaining_volume(), Volume::from_u64(6));
        assert!(!order.is_removed());
    }

    #[test]
    fn test_replayed_execution_is_not_double_counted() {
        let mut order = Order::from_event(&row(OrderEventKind::New, 10, 1));
        order.apply_trade_event(&fill(99, 4));
        order.apply_trade_event(&fill(99, 4));

        assert_eq!(order.filled_volume(), Volume::from_u64(4));
        assert_eq!(order.execution_count(), 1);
    }

    #[test]
    fn test_exhausting_trade_flags_order() {
        let mut order = Order::from_event(&row(OrderEventKind::New, 5, 1));
        assert!(!order.apply_trade_event(&fill(7, 2)));
        assert!(order.apply_trade_event(&fill(8, 3)));
        assert!(order.is_removed());
        assert_eq!(order.remaining_volume(), Volume::ZERO);
    }

    #[test]
    fn test_unattributed_trade_ignored() {
        let mut order = Order::from_event(&row(OrderEventKind::New, 5, 1));
        let mut anonymous = fill(7, 5);
        anonymous.aggressor_order_id = None;

        assert!(!order.apply_trade_event(&anonymous));
        assert_eq!(order.filled_volume(), Volume::ZERO);
    }

    #[test]
    fn test_requeue_keeps_fills_on_top_of_reported_volume() {
        let mut order = Order::from_event(&row(OrderEventKind::New, 10, 1));
        order.apply_trade_event(&fill(99, 4));

        assert!(!apply(&mut order, &row(OrderEventKind::Change, 3, 2)));
        assert_eq!(order.priority(), 2);
        assert_eq!(order.total_volume(), Volume::from_u64(7));
        assert_eq!(order.remaining_volume(), Volume::from_u64(3));
    }

    #[test]
    fn test_change_down_to_filled_flags_order() {
        let mut order = Order::from_event(&row(OrderEventKind::New, 10, 1));
        order.apply_trade_event(&fill(99, 4));

        assert!(apply(&mut order, &row(OrderEventKind::Change, 4, 1)));
        assert!(order.is_removed());
    }

    #[test]
    fn test_delete_records_remaining_as_deleted() {
        let mut order = Order::from_event(&row(OrderEventKind::New, 10, 1));
        order.apply_trade_event(&fill(99, 4));

        assert!(apply(&mut order, &row(OrderEventKind::Delete, 0, 1)));
        assert_eq!(order.deleted_volume(), Volume::from_u64(6));
    }

    #[test]
    fn test_partial_delete_discloses_amount() {
        let mut order = Order::from_event(&row(OrderEventKind::New, 10, 1));
        assert!(apply(&mut order, &row(OrderEventKind::Delete, 3, 1)));
        assert_eq!(order.deleted_volume(), Volume::from_u64(3));
    }

    #[test]
    fn test_removal_flag_is_sticky() {
        let mut order = Order::from_event(&row(OrderEventKind::New, 10, 1));
        assert!(apply(&mut order, &row(OrderEventKind::Delete, 0, 1)));
        assert!(!apply(&mut order, &row(OrderEventKind::Change, 8, 1)));
        assert!(order.is_removed());
    }

    #[test]
    fn test_grace_period_counts_one_cycle() {
        let mut order = Order::from_event(&row(OrderEventKind::New, 10, 1));
        assert!(!order.advance_grace(1), "live orders never expire");

        apply(&mut order, &row(OrderEventKind::Delete, 0, 1));
        assert!(!order.is_expired(1));
        assert!(!order.advance_grace(1));
        assert!(order.is_expired(1));
        assert!(order.advance_grace(1));
    }

    #[test]
    fn test_zero_volume_snapshot_row_starts_removed() {
        let order = Order::from_event(&row(OrderEventKind::Snapshot, 0, 1));
        assert!(order.is_removed());
        assert_eq!(order.deleted_volume(), Volume::ZERO);
    }
}
