//! Producer → applier update channel
//!
//! Producers on any task or thread push batches through a cloneable
//! `UpdateSender` and never wait on the book. A single applier task drains
//! the channel in FIFO order and applies each batch under the book's write
//! lock, so a reader sees either none or all of a batch.
//!
//! Sequence keys come from the caller or are stamped from arrival time.
//! Stamped keys are strictly increasing across all clones of a sender.
//!
//! Before the first order batch is accepted, the host's full-book snapshot
//! (if any) is enqueued ahead of it, exactly once.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Once, PoisonError, RwLock};
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use types::order::{OrderEvent, OrderEventKind};
use types::trade::TradeEvent;

use crate::book::{BatchOutcome, BookState};
use crate::events::{DepthBatch, SequenceKey, UpdateBatch};
use crate::metrics::BookMetrics;
use crate::reaper::Reaper;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("update channel closed; batch {0} dropped")]
    Closed(SequenceKey),
}

/// Host-provided full book, used to prime the channel.
pub trait SnapshotSource: Send + Sync + 'static {
    /// Every resting order the host currently knows about.
    fn full_snapshot(&self) -> Vec<OrderEvent>;
}

/// Source for hosts without a snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSnapshot;

impl SnapshotSource for NoSnapshot {
    fn full_snapshot(&self) -> Vec<OrderEvent> {
        Vec::new()
    }
}

impl<F> SnapshotSource for F
where
    F: Fn() -> Vec<OrderEvent> + Send + Sync + 'static,
{
    fn full_snapshot(&self) -> Vec<OrderEvent> {
        self()
    }
}

/// Arrival-time key stamping.
#[derive(Debug)]
struct SequenceClock {
    origin: Instant,
    last: AtomicU64,
}

impl SequenceClock {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            last: AtomicU64::new(0),
        }
    }

    /// Nanoseconds since start, bumped past the previous key on ties.
    fn next(&self) -> SequenceKey {
        let now = (self.origin.elapsed().as_nanos() as u64).saturating_add(1);
        let prev = match self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last + 1))
            }) {
            Ok(prev) | Err(prev) => prev,
        };
        SequenceKey::new(now.max(prev + 1))
    }
}

struct SenderShared {
    clock: SequenceClock,
    prime_with_snapshot: bool,
    primed: Once,
    snapshot: Box<dyn SnapshotSource>,
}

/// Cloneable producer handle.
#[derive(Clone)]
pub struct UpdateSender {
    tx: mpsc::UnboundedSender<UpdateBatch>,
    shared: Arc<SenderShared>,
}

impl UpdateSender {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<UpdateBatch>,
        prime_with_snapshot: bool,
        snapshot: Box<dyn SnapshotSource>,
    ) -> Self {
        Self {
            tx,
            shared: Arc::new(SenderShared {
                clock: SequenceClock::new(),
                prime_with_snapshot,
                primed: Once::new(),
                snapshot,
            }),
        }
    }

    /// A fresh arrival-time key.
    pub fn next_key(&self) -> SequenceKey {
        self.shared.clock.next()
    }

    /// Enqueue order events under a stamped key.
    pub fn send_orders(&self, orders: Vec<OrderEvent>) -> Result<SequenceKey, ChannelError> {
        self.prime();
        let key = self.next_key();
        self.enqueue(UpdateBatch::orders(key, orders))?;
        Ok(key)
    }

    /// Enqueue trade events under a stamped key.
    pub fn send_trades(&self, trades: Vec<TradeEvent>) -> Result<SequenceKey, ChannelError> {
        let key = self.next_key();
        self.enqueue(UpdateBatch::trades(key, trades))?;
        Ok(key)
    }

    /// Enqueue a level-2 payload under a stamped key.
    pub fn send_depth(&self, depth: DepthBatch) -> Result<SequenceKey, ChannelError> {
        let key = self.next_key();
        self.enqueue(UpdateBatch::depth(key, depth))?;
        Ok(key)
    }

    /// Enqueue a batch carrying its own external key.
    pub fn send_batch(&self, batch: UpdateBatch) -> Result<SequenceKey, ChannelError> {
        if batch.has_orders() {
            self.prime();
        }
        let key = batch.sequence_key;
        self.enqueue(batch)?;
        Ok(key)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn enqueue(&self, batch: UpdateBatch) -> Result<(), ChannelError> {
        let key = batch.sequence_key;
        self.tx.send(batch).map_err(|_| ChannelError::Closed(key))
    }

    /// Enqueue the host snapshot once, ahead of the first order batch.
    ///
    /// Concurrent first senders wait here until the snapshot is queued.
    fn prime(&self) {
        let shared = &self.shared;
        if !shared.prime_with_snapshot {
            return;
        }
        shared.primed.call_once(|| {
            let rows: Vec<OrderEvent> = shared
                .snapshot
                .full_snapshot()
                .into_iter()
                .map(|mut row| {
                    row.kind = OrderEventKind::Snapshot;
                    row
                })
                .collect();
            if rows.is_empty() {
                info!("No host snapshot to prime the book with");
                return;
            }
            let key = shared.clock.next();
            info!(rows = rows.len(), sequence = %key, "Priming book with host snapshot");
            if self.enqueue(UpdateBatch::orders(key, rows)).is_err() {
                warn!("Channel closed before the host snapshot could be queued");
            }
        });
    }
}

/// Apply one batch: book write lock, then reaper lock.
///
/// A panic inside the book is contained here; the poisoned lock is
/// recovered by the next writer or reader.
pub(crate) fn apply_one(
    book: &RwLock<BookState>,
    reaper: &Mutex<Reaper>,
    metrics: &BookMetrics,
    batch: &UpdateBatch,
) -> Option<BatchOutcome> {
    let started = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut book = book.write().unwrap_or_else(PoisonError::into_inner);
        let outcome = book.apply_batch(batch);
        if !outcome.flagged().is_empty() {
            reaper
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .enqueue(outcome.flagged().iter().copied());
        }
        outcome
    }));

    match result {
        Ok(outcome) => {
            match &outcome {
                BatchOutcome::Applied(applied) => {
                    metrics.record_applied(applied, started.elapsed().as_nanos() as u64)
                }
                BatchOutcome::Duplicate(_) => metrics.record_duplicate(),
            }
            Some(outcome)
        }
        Err(_) => {
            metrics.record_panic();
            error!(
                sequence = %batch.sequence_key,
                kind = batch.label(),
                "Applier panicked; batch abandoned"
            );
            None
        }
    }
}

/// Drain the channel until shutdown or until every sender is gone.
///
/// Batches still queued at shutdown are dropped.
pub(crate) async fn run_applier(
    mut rx: mpsc::UnboundedReceiver<UpdateBatch>,
    book: Arc<RwLock<BookState>>,
    reaper: Arc<Mutex<Reaper>>,
    metrics: Arc<BookMetrics>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Applier started");

    loop {
        let batch = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            batch = rx.recv() => match batch {
                Some(batch) => batch,
                None => break,
            },
        };
        apply_one(&book, &reaper, &metrics, &batch);
    }

    rx.close();
    let mut dropped = 0usize;
    while rx.try_recv().is_ok() {
        dropped += 1;
    }
    info!(dropped, "Applier stopped");
}
