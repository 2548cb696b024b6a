//! Aggregated (level-2) depth entries
//!
//! One entry per price with no per-order detail.

use crate::numeric::{Price, Volume};
use crate::order::Side;
use serde::{Deserialize, Serialize};

/// Aggregate volume resting at one price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Price,
    pub side: Side,
    pub volume: Volume,
    /// Unix nanos from the venue clock
    pub timestamp: i64,
}

impl DepthLevel {
    pub fn new(price: Price, side: Side, volume: Volume, timestamp: i64) -> Self {
        Self {
            price,
            side,
            volume,
            timestamp,
        }
    }
}
