//! Running book pipeline
//!
//! `BookEngine::start` spawns the applier and the reaper on the current
//! tokio runtime and hands back producer and reader handles. The book sits
//! behind one `RwLock`: the applier and reaper take it for writing, renders
//! take it for reading and copy out what they need.

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};

use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use types::numeric::{Price, Volume};
use types::order::Side;

use crate::book::BookState;
use crate::channel::{run_applier, SnapshotSource, UpdateSender};
use crate::config::{BookConfig, ConfigError};
use crate::events::SequenceKey;
use crate::metrics::{BookMetrics, MetricsSnapshot};
use crate::reaper::{run_reaper, sweep_shared, Reaper, SweepReport};
use crate::view::{DataSource, OrderView, RangeAggregate, RangeSnapshot};

pub struct BookEngine {
    book: Arc<RwLock<BookState>>,
    reaper: Arc<Mutex<Reaper>>,
    metrics: Arc<BookMetrics>,
    sender: UpdateSender,
    shutdown: watch::Sender<bool>,
    applier_task: JoinHandle<()>,
    reaper_task: JoinHandle<()>,
}

impl BookEngine {
    /// Validate `config`, then spawn the applier and reaper tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: BookConfig, snapshot: impl SnapshotSource) -> Result<Self, ConfigError> {
        config.validate()?;

        let book = Arc::new(RwLock::new(BookState::new(&config)));
        let reaper = Arc::new(Mutex::new(Reaper::new()));
        let metrics = Arc::new(BookMetrics::new());
        let (shutdown, shutdown_rx) = watch::channel(false);

        let (tx, rx) = mpsc::unbounded_channel();
        let sender = UpdateSender::new(tx, config.channel.prime_with_snapshot, Box::new(snapshot));

        let applier_task = tokio::spawn(run_applier(
            rx,
            Arc::clone(&book),
            Arc::clone(&reaper),
            Arc::clone(&metrics),
            shutdown_rx.clone(),
        ));
        let reaper_task = tokio::spawn(run_reaper(
            Arc::clone(&book),
            Arc::clone(&reaper),
            Arc::clone(&metrics),
            config.reaper.interval(),
            shutdown_rx,
        ));

        info!(
            grace_cycles = config.reaper.grace_cycles,
            interval_ms = config.reaper.interval_ms,
            prime_with_snapshot = config.channel.prime_with_snapshot,
            "Book engine started"
        );

        Ok(Self {
            book,
            reaper,
            metrics,
            sender,
            shutdown,
            applier_task,
            reaper_task,
        })
    }

    /// Producer handle; clone freely.
    pub fn sender(&self) -> UpdateSender {
        self.sender.clone()
    }

    /// Read-side handle; clone freely.
    pub fn reader(&self) -> BookReader {
        BookReader {
            book: Arc::clone(&self.book),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn shared_metrics(&self) -> Arc<BookMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run one reaper sweep now, outside the timer.
    pub fn sweep_now(&self) -> SweepReport {
        let report = sweep_shared(&self.book, &self.reaper);
        self.metrics.record_sweep(&report);
        report
    }

    pub fn pending_reaps(&self) -> usize {
        self.reaper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending_len()
    }

    /// Stop both tasks. Batches not yet applied are dropped.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        drop(self.sender);
        if let Err(e) = self.applier_task.await {
            warn!(error = %e, "Applier task ended abnormally");
        }
        if let Err(e) = self.reaper_task.await {
            warn!(error = %e, "Reaper task ended abnormally");
        }
        info!("Book engine stopped");
    }
}

/// Read-only access for the render path.
///
/// Every call holds the read lock only for the duration of the copy.
#[derive(Clone)]
pub struct BookReader {
    book: Arc<RwLock<BookState>>,
}

impl BookReader {
    fn read(&self) -> RwLockReadGuard<'_, BookState> {
        self.book.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the book under the read lock.
    pub fn with_book<R>(&self, f: impl FnOnce(&BookState) -> R) -> R {
        f(&self.read())
    }

    pub fn snapshot_range(&self, high: Price, low: Price, tick: Decimal) -> RangeSnapshot {
        self.read().snapshot_range(high, low, tick)
    }

    pub fn orders_at_price(
        &self,
        price: Price,
        best_ask: Option<Price>,
        best_bid: Option<Price>,
    ) -> Option<(Vec<OrderView>, Side)> {
        self.read().orders_at_price(price, best_ask, best_bid)
    }

    pub fn aggregate_in_range(
        &self,
        high: Price,
        low: Price,
        tick: Decimal,
        weighted: bool,
    ) -> RangeAggregate {
        self.read().aggregate_in_range(high, low, tick, weighted)
    }

    pub fn volume_at(&self, price: Price) -> (Volume, DataSource) {
        self.read().volume_at(price)
    }

    pub fn source(&self) -> DataSource {
        self.read().source()
    }

    pub fn last_applied(&self) -> Option<SequenceKey> {
        self.read().last_applied()
    }

    pub fn checksum(&self) -> String {
        self.read().checksum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::NoSnapshot;
    use types::ids::OrderId;
    use types::order::{OrderEvent, OrderEventKind};

    fn new_order(id: u64, price: u64, volume: u64) -> OrderEvent {
        OrderEvent {
            order_id: OrderId::new(id),
            price: Price::from_u64(price),
            side: Side::Bid,
            volume: Volume::from_u64(volume),
            priority: id,
            kind: OrderEventKind::New,
            timestamp: 0,
        }
    }

    async fn settle(reader: &BookReader, key: SequenceKey) {
        for _ in 0..1000 {
            if reader.last_applied() == Some(key) {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("batch {key} never applied");
    }

    #[tokio::test]
    async fn test_engine_applies_sent_orders() {
        let engine = BookEngine::start(BookConfig::default(), NoSnapshot).unwrap();
        let reader = engine.reader();

        let key = engine.sender().send_orders(vec![new_order(1, 100, 4)]).unwrap();
        settle(&reader, key).await;

        assert_eq!(reader.source(), DataSource::Level3);
        assert_eq!(reader.volume_at(Price::from_u64(100)).0, Volume::from_u64(4));
        assert_eq!(engine.metrics().batches_applied, 1);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_send_after_shutdown_is_rejected() {
        let engine = BookEngine::start(BookConfig::default(), NoSnapshot).unwrap();
        let sender = engine.sender();
        engine.shutdown().await;

        assert!(sender.send_orders(vec![new_order(1, 100, 4)]).is_err());
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let mut config = BookConfig::default();
        config.reaper.interval_ms = 0;
        assert!(matches!(
            BookEngine::start(config, NoSnapshot),
            Err(ConfigError::Invalid { field: "reaper.interval_ms", .. })
        ));

        let mut config = BookConfig::default();
        config.reaper.grace_cycles = 0;
        assert!(matches!(
            BookEngine::start(config, NoSnapshot),
            Err(ConfigError::Invalid { field: "reaper.grace_cycles", .. })
        ));
    }
}
