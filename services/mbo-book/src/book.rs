//! Order-level ("level-3") book state
//!
//! Maintains price → `PriceLevel` plus the order location index, applies
//! update batches, and answers read-only queries for the render path.
//!
//! The book processes, per batch:
//! - depth payload → level-2 fallback store
//! - order events → location lookup, price migration, level dispatch
//! - trade events → execution attribution at the trade price and, when the
//!   order has moved since, at its indexed price as well
//!
//! Orders flagged for removal are reported back to the caller so the reaper
//! can purge them after their grace period; the book itself never drops a
//! flagged order on the update path except through a Snapshot/New purge.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use types::ids::OrderId;
use types::numeric::{Price, Volume};
use types::order::{OrderEvent, Side};
use types::trade::TradeEvent;

use crate::config::BookConfig;
use crate::depth::DepthStore;
use crate::events::{DepthBatch, NormalizedAction, SequenceKey, UpdateBatch};
use crate::location::OrderLocationIndex;
use crate::price_level::{LevelChange, PriceLevel};
use crate::view::{DataSource, LevelView, OrderView, RangeAggregate, RangeSnapshot};

/// Result of handing one batch to the book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Applied(AppliedBatch),
    /// Same sequence key as the batch applied just before; nothing changed.
    Duplicate(SequenceKey),
}

impl BatchOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, BatchOutcome::Duplicate(_))
    }

    /// Orders the reaper must visit, empty for duplicates.
    pub fn flagged(&self) -> &[(Price, OrderId)] {
        match self {
            BatchOutcome::Applied(applied) => &applied.flagged,
            BatchOutcome::Duplicate(_) => &[],
        }
    }
}

/// What a non-duplicate batch did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedBatch {
    /// (price, order) pairs newly flagged for removal.
    pub flagged: Vec<(Price, OrderId)>,
    pub order_events: usize,
    pub trade_events: usize,
    /// Trades without both a resting and an aggressor id.
    pub ignored_trades: usize,
    pub migrations: usize,
    pub side_flips: usize,
}

/// Outcome of one reaper visit to a flagged order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapStatus {
    /// Level or order is gone (migrated, replaced or already purged).
    Missing,
    /// Still inside its grace period; visit again next sweep.
    Pending,
    /// Present but no longer flagged (replaced by a fresh Snapshot/New row).
    Live,
    Purged,
}

#[derive(Debug, Clone)]
pub struct BookState {
    levels: BTreeMap<Price, PriceLevel>,
    index: OrderLocationIndex,
    depth: DepthStore,
    last_applied: Option<SequenceKey>,
    /// Set by the first order-level event; never cleared.
    level3_active: bool,
    grace_cycles: u32,
    max_range_levels: usize,
}

impl BookState {
    pub fn new(config: &BookConfig) -> Self {
        Self {
            levels: BTreeMap::new(),
            index: OrderLocationIndex::new(),
            depth: DepthStore::new(),
            last_applied: None,
            level3_active: false,
            grace_cycles: config.reaper.grace_cycles,
            max_range_levels: config.view.max_range_levels,
        }
    }

    /// Apply one update batch.
    ///
    /// A batch whose key equals the last applied key is dropped.
    pub fn apply_batch(&mut self, batch: &UpdateBatch) -> BatchOutcome {
        let sequence = batch.sequence_key;
        if self.last_applied == Some(sequence) {
            warn!(sequence = %sequence, kind = batch.label(), "Dropping duplicate batch");
            return BatchOutcome::Duplicate(sequence);
        }

        let mut applied = AppliedBatch::default();

        if let Some(depth) = &batch.depth {
            self.apply_depth(depth);
        }
        for event in &batch.orders {
            self.apply_order_event(event, sequence, &mut applied);
        }
        for trade in &batch.trades {
            self.apply_trade_event(trade, sequence, &mut applied);
        }

        self.last_applied = Some(sequence);

        debug!(
            sequence = %sequence,
            orders = applied.order_events,
            trades = applied.trade_events,
            flagged = applied.flagged.len(),
            migrations = applied.migrations,
            "Batch applied"
        );

        BatchOutcome::Applied(applied)
    }

    fn apply_depth(&mut self, depth: &DepthBatch) {
        match depth {
            DepthBatch::Snapshot(levels) => self.depth.apply_snapshot(levels),
            DepthBatch::Incremental(levels) => self.depth.apply_update(levels),
        }
    }

    fn apply_order_event(
        &mut self,
        event: &OrderEvent,
        sequence: SequenceKey,
        applied: &mut AppliedBatch,
    ) {
        let action = NormalizedAction::of(event);
        let order_id = event.order_id;
        let price = event.price;

        self.level3_active = true;
        applied.order_events += 1;

        if let Some(indexed) = self.index.price_of(&order_id) {
            if indexed != price {
                let moved = self
                    .levels
                    .get_mut(&indexed)
                    .and_then(|level| level.cut_order(order_id));
                if let Some(order) = moved {
                    // A flagged order's pending reap points at the old price.
                    let flagged = order.is_removed();
                    self.level_entry(price, event.side).attach_order(order);
                    if flagged {
                        applied.flagged.push((price, order_id));
                    }
                    applied.migrations += 1;
                    debug!(
                        order_id = %order_id,
                        from = %indexed,
                        to = %price,
                        "Order migrated"
                    );
                }
            }
        }

        let grace_cycles = self.grace_cycles;
        let change = if action.is_remove() {
            match self.levels.get_mut(&price) {
                Some(level) => level.apply_order_event(event, action, sequence, grace_cycles),
                None => {
                    debug!(order_id = %order_id, price = %price, "Delete for unknown level ignored");
                    LevelChange::default()
                }
            }
        } else {
            let level = self.level_entry(price, event.side);
            let side_before = level.side();
            let change = level.apply_order_event(event, action, sequence, grace_cycles);
            if level.side() != side_before {
                applied.side_flips += 1;
                debug!(
                    price = %price,
                    evicted = change.evicted.len(),
                    side = ?level.side(),
                    "Level side flipped"
                );
            }
            change
        };

        for evicted in &change.evicted {
            self.index.forget_at(evicted, price);
        }
        applied
            .flagged
            .extend(change.flagged.into_iter().map(|id| (price, id)));

        if action.is_remove() {
            self.index.forget(&order_id);
        } else {
            self.index.record(order_id, price);
        }
    }

    fn apply_trade_event(
        &mut self,
        trade: &TradeEvent,
        sequence: SequenceKey,
        applied: &mut AppliedBatch,
    ) {
        applied.trade_events += 1;

        let Some((order_id, _)) = trade.attribution() else {
            applied.ignored_trades += 1;
            debug!(price = %trade.price, "Unattributed trade ignored");
            return;
        };

        // The print and the index can each be stale relative to the other,
        // so both candidate levels are visited. Executions are keyed by
        // aggressor and only one level holds the order, so this never
        // double-counts.
        let mut prices = vec![trade.price];
        if let Some(indexed) = self.index.price_of(&order_id) {
            if indexed != trade.price {
                prices.push(indexed);
            }
        }

        for price in prices {
            if let Some(level) = self.levels.get_mut(&price) {
                if let Some(flagged) = level.apply_trade_event(trade, sequence) {
                    applied.flagged.push((price, flagged));
                }
            }
        }
    }

    fn level_entry(&mut self, price: Price, side: Side) -> &mut PriceLevel {
        self.levels
            .entry(price)
            .or_insert_with(|| PriceLevel::new(price, side))
    }

    /// Visit one flagged order on behalf of the reaper.
    pub fn reap_order(&mut self, price: Price, order_id: OrderId) -> ReapStatus {
        let grace_cycles = self.grace_cycles;
        let Some(level) = self.levels.get_mut(&price) else {
            return ReapStatus::Missing;
        };
        match level.get(&order_id) {
            None => return ReapStatus::Missing,
            Some(order) if !order.is_removed() => return ReapStatus::Live,
            Some(_) => {}
        }
        match level.reap(order_id, grace_cycles) {
            Some(true) => {
                self.index.forget_at(&order_id, price);
                ReapStatus::Purged
            }
            Some(false) => ReapStatus::Pending,
            None => ReapStatus::Missing,
        }
    }

    /// Which store answers queries.
    pub fn source(&self) -> DataSource {
        if self.level3_active {
            DataSource::Level3
        } else {
            DataSource::Level2
        }
    }

    /// Orders resting at `price`, in priority order, with the level's side.
    ///
    /// Returns no orders for an ask level below the best ask or a bid level
    /// above the best bid: the market has moved through that price and the
    /// rows there no longer mean what their side says.
    pub fn orders_at_price(
        &self,
        price: Price,
        best_ask: Option<Price>,
        best_bid: Option<Price>,
    ) -> Option<(Vec<OrderView>, Side)> {
        let (orders, side) = match self.source() {
            DataSource::Level3 => {
                let level = self.levels.get(&price)?;
                (level.order_views(), level.side())
            }
            DataSource::Level2 => self.depth.orders_at_price(price)?,
        };

        let crossed = match side {
            Side::Ask => best_ask.is_some_and(|ask| price < ask),
            Side::Bid => best_bid.is_some_and(|bid| price > bid),
        };
        if crossed {
            return Some((Vec::new(), side));
        }
        Some((orders, side))
    }

    /// Peak volume and order count between `high` and `low`, walked by tick.
    ///
    /// With `weighted`, both figures come from the single price whose
    /// volume × count is largest; otherwise each peak is tracked on its own.
    pub fn aggregate_in_range(
        &self,
        high: Price,
        low: Price,
        tick: Decimal,
        weighted: bool,
    ) -> RangeAggregate {
        let mut result = RangeAggregate::default();
        let mut best_weight = Decimal::ZERO;

        for price in price_ladder(high, low, tick, self.max_range_levels) {
            let (volume, count) = self.row_weight(price);
            if weighted {
                let weight = volume * count as u64;
                if weight > best_weight {
                    best_weight = weight;
                    result = RangeAggregate {
                        max_volume: volume,
                        max_count: count,
                    };
                }
            } else {
                result.max_volume = result.max_volume.max(volume);
                result.max_count = result.max_count.max(count);
            }
        }

        result
    }

    fn row_weight(&self, price: Price) -> (Volume, usize) {
        match self.source() {
            DataSource::Level3 => self
                .levels
                .get(&price)
                .map(|l| (l.resting_volume(), l.live_order_count()))
                .unwrap_or((Volume::ZERO, 0)),
            DataSource::Level2 => self
                .depth
                .get(price)
                .map(|e| (e.volume, 1))
                .unwrap_or((Volume::ZERO, 0)),
        }
    }

    /// Resting volume at `price` and which store it came from.
    ///
    /// Once order-level data is active the order book answers, even with
    /// zero.
    pub fn volume_at(&self, price: Price) -> (Volume, DataSource) {
        match self.source() {
            DataSource::Level3 => (
                self.levels
                    .get(&price)
                    .map(PriceLevel::resting_volume)
                    .unwrap_or(Volume::ZERO),
                DataSource::Level3,
            ),
            DataSource::Level2 => (self.depth.volume_at(price), DataSource::Level2),
        }
    }

    /// Owned copy of every non-empty row between `high` and `low`.
    pub fn snapshot_range(&self, high: Price, low: Price, tick: Decimal) -> RangeSnapshot {
        let source = self.source();
        let levels = price_ladder(high, low, tick, self.max_range_levels)
            .into_iter()
            .filter_map(|price| match source {
                DataSource::Level3 => self.levels.get(&price).map(PriceLevel::to_view),
                DataSource::Level2 => self.depth.level_view(price),
            })
            .filter(LevelView::has_content)
            .collect();

        RangeSnapshot {
            source,
            last_sequence: self.last_applied,
            levels,
        }
    }

    pub fn level(&self, price: Price) -> Option<&PriceLevel> {
        self.levels.get(&price)
    }

    pub fn levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.levels.values()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn index(&self) -> &OrderLocationIndex {
        &self.index
    }

    pub fn depth(&self) -> &DepthStore {
        &self.depth
    }

    /// Total orders held across all levels, flagged ones included.
    pub fn order_count(&self) -> usize {
        self.levels.values().map(PriceLevel::order_count).sum()
    }

    pub fn last_applied(&self) -> Option<SequenceKey> {
        self.last_applied
    }

    pub fn grace_cycles(&self) -> u32 {
        self.grace_cycles
    }

    /// SHA-256 over levels, orders and the location index.
    ///
    /// Iteration is over `BTreeMap`s only, so equal books hash equal.
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();

        for (price, level) in &self.levels {
            hasher.update(price.to_string().as_bytes());
            hasher.update(format!("{:?}", level.side()).as_bytes());
            hasher.update(b"[");
            for order in level.orders() {
                hasher.update(order.order_id().as_u64().to_le_bytes());
                hasher.update(order.priority().to_le_bytes());
                hasher.update(order.total_volume().to_string().as_bytes());
                hasher.update(b":");
                hasher.update(order.filled_volume().to_string().as_bytes());
                hasher.update(b":");
                hasher.update(order.deleted_volume().to_string().as_bytes());
                hasher.update([order.is_removed() as u8]);
                hasher.update(b"|");
            }
            hasher.update(b"]");
        }
        hasher.update(b"---");

        for (order_id, price) in self.index.iter() {
            hasher.update(order_id.as_u64().to_le_bytes());
            hasher.update(price.to_string().as_bytes());
            hasher.update(b"|");
        }
        hasher.update(b"---");

        if let Some(sequence) = self.last_applied {
            hasher.update(sequence.as_u64().to_le_bytes());
        }

        format!("{:x}", hasher.finalize())
    }
}

impl Default for BookState {
    fn default() -> Self {
        Self::new(&BookConfig::default())
    }
}

/// Prices from `high` down to `low` inclusive, one tick apart.
fn price_ladder(high: Price, low: Price, tick: Decimal, max_levels: usize) -> Vec<Price> {
    if tick <= Decimal::ZERO || high < low {
        return Vec::new();
    }
    let mut prices = Vec::new();
    let mut price = high;
    while price >= low && prices.len() < max_levels {
        prices.push(price);
        price = price.minus_tick(tick);
    }
    prices
}
