//! Deferred purge of orders flagged for removal
//!
//! The applier hands every newly flagged (price, order) pair to the reaper.
//! Each sweep visits the pending pairs once: orders still inside their grace
//! period stay queued, expired ones are dropped from their level, and pairs
//! whose level or order is already gone are discarded. Misses are normal:
//! the order may have migrated or been replaced since it was flagged.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use types::ids::OrderId;
use types::numeric::Price;

use crate::book::{BookState, ReapStatus};
use crate::metrics::BookMetrics;

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub visited: usize,
    pub purged: usize,
    /// Still within grace; queued for the next sweep.
    pub pending: usize,
    /// Level or order no longer present.
    pub missing: usize,
    /// Order present but live again.
    pub released: usize,
}

#[derive(Debug, Default)]
pub struct Reaper {
    pending: BTreeSet<(Price, OrderId)>,
}

impl Reaper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue flagged orders. Re-queuing a pair already pending is a no-op.
    pub fn enqueue(&mut self, flagged: impl IntoIterator<Item = (Price, OrderId)>) {
        self.pending.extend(flagged);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    /// Visit every pending pair once.
    pub fn sweep(&mut self, book: &mut BookState) -> SweepReport {
        let mut report = SweepReport::default();
        let pending = std::mem::take(&mut self.pending);

        for (price, order_id) in pending {
            report.visited += 1;
            match book.reap_order(price, order_id) {
                ReapStatus::Purged => report.purged += 1,
                ReapStatus::Pending => {
                    report.pending += 1;
                    self.pending.insert((price, order_id));
                }
                ReapStatus::Missing => report.missing += 1,
                ReapStatus::Live => report.released += 1,
            }
        }

        if report.visited > 0 {
            debug!(
                visited = report.visited,
                purged = report.purged,
                pending = report.pending,
                missing = report.missing,
                "Reaper sweep"
            );
        }
        report
    }
}

/// Sweep under the book's write lock.
///
/// Lock order is book then reaper, the same as the applier's.
pub fn sweep_shared(book: &RwLock<BookState>, reaper: &Mutex<Reaper>) -> SweepReport {
    let mut book = book.write().unwrap_or_else(PoisonError::into_inner);
    let mut reaper = reaper.lock().unwrap_or_else(PoisonError::into_inner);
    reaper.sweep(&mut book)
}

/// Periodic sweep loop.
///
/// The next tick is only awaited once the current sweep has returned, so
/// sweeps never overlap; ticks missed during a long sweep are not replayed.
pub(crate) async fn run_reaper(
    book: Arc<RwLock<BookState>>,
    reaper: Arc<Mutex<Reaper>>,
    metrics: Arc<BookMetrics>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately.
    ticker.tick().await;

    info!(interval_ms = interval.as_millis() as u64, "Reaper started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        let report = sweep_shared(&book, &reaper);
        metrics.record_sweep(&report);
    }

    info!("Reaper stopped");
}
