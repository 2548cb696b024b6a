//! Trade executions
//!
//! Trade prints may or may not carry the resting (passive) order id and the
//! aggressor id. Only prints carrying both can be attributed to a book order.

use crate::ids::OrderId;
use crate::numeric::{Price, Volume};
use crate::order::Side;
use serde::{Deserialize, Serialize};

/// A trade print from the host trade subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub price: Price,
    pub volume: Volume,
    /// Resting order that was hit
    #[serde(default)]
    pub order_id: Option<OrderId>,
    /// Incoming order that crossed the spread
    #[serde(default)]
    pub aggressor_order_id: Option<OrderId>,
    /// Aggressor side
    pub side: Side,
    /// Unix nanos from the venue clock
    pub timestamp: i64,
}

impl TradeEvent {
    /// Resting and aggressor ids, when both are present
    pub fn attribution(&self) -> Option<(OrderId, OrderId)> {
        match (self.order_id, self.aggressor_order_id) {
            (Some(order_id), Some(aggressor)) => Some((order_id, aggressor)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn print(order_id: Option<u64>, aggressor: Option<u64>) -> TradeEvent {
        TradeEvent {
            price: Price::from_u64(100),
            volume: Volume::from_u64(4),
            order_id: order_id.map(OrderId::new),
            aggressor_order_id: aggressor.map(OrderId::new),
            side: Side::Ask,
            timestamp: 0,
        }
    }

    #[test]
    fn test_attribution_requires_both_ids() {
        assert_eq!(
            print(Some(1), Some(99)).attribution(),
            Some((OrderId::new(1), OrderId::new(99)))
        );
        assert!(print(Some(1), None).attribution().is_none());
        assert!(print(None, Some(99)).attribution().is_none());
    }

    #[test]
    fn test_missing_ids_default_to_none() {
        let json = r#"{"price":"100","volume":"1","side":"ASK","timestamp":5}"#;
        let trade: TradeEvent = serde_json::from_str(json).unwrap();
        assert!(trade.order_id.is_none());
        assert!(trade.aggressor_order_id.is_none());
    }
}
