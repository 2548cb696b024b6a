//! Counters for the book pipeline
//!
//! Lock-free counters updated by the applier and the reaper, plus a small
//! latency window for batch application. `export` gives a sorted
//! name → value map for whatever exposition the host uses.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::book::AppliedBatch;
use crate::reaper::SweepReport;

pub struct BookMetrics {
    // Applier
    pub batches_applied: AtomicU64,
    pub duplicates_dropped: AtomicU64,
    pub order_events: AtomicU64,
    pub trade_events: AtomicU64,
    pub ignored_trades: AtomicU64,
    pub migrations: AtomicU64,
    pub side_flips: AtomicU64,
    pub applier_panics: AtomicU64,
    pub batch_apply_ns: Mutex<LatencyTracker>,

    // Reaper
    pub sweeps: AtomicU64,
    pub orders_reaped: AtomicU64,
    pub reaper_misses: AtomicU64,
}

impl BookMetrics {
    pub fn new() -> Self {
        Self {
            batches_applied: AtomicU64::new(0),
            duplicates_dropped: AtomicU64::new(0),
            order_events: AtomicU64::new(0),
            trade_events: AtomicU64::new(0),
            ignored_trades: AtomicU64::new(0),
            migrations: AtomicU64::new(0),
            side_flips: AtomicU64::new(0),
            applier_panics: AtomicU64::new(0),
            batch_apply_ns: Mutex::new(LatencyTracker::new(1000)),
            sweeps: AtomicU64::new(0),
            orders_reaped: AtomicU64::new(0),
            reaper_misses: AtomicU64::new(0),
        }
    }

    /// Record a batch that changed the book.
    pub fn record_applied(&self, applied: &AppliedBatch, latency_ns: u64) {
        self.batches_applied.fetch_add(1, Ordering::Relaxed);
        self.order_events
            .fetch_add(applied.order_events as u64, Ordering::Relaxed);
        self.trade_events
            .fetch_add(applied.trade_events as u64, Ordering::Relaxed);
        self.ignored_trades
            .fetch_add(applied.ignored_trades as u64, Ordering::Relaxed);
        self.migrations
            .fetch_add(applied.migrations as u64, Ordering::Relaxed);
        self.side_flips
            .fetch_add(applied.side_flips as u64, Ordering::Relaxed);
        if let Ok(mut tracker) = self.batch_apply_ns.lock() {
            tracker.record(latency_ns);
        }
    }

    pub fn record_duplicate(&self) {
        self.duplicates_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_panic(&self) {
        self.applier_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sweep(&self, report: &SweepReport) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.orders_reaped
            .fetch_add(report.purged as u64, Ordering::Relaxed);
        self.reaper_misses
            .fetch_add(report.missing as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_applied: self.batches_applied.load(Ordering::Relaxed),
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
            order_events: self.order_events.load(Ordering::Relaxed),
            trade_events: self.trade_events.load(Ordering::Relaxed),
            ignored_trades: self.ignored_trades.load(Ordering::Relaxed),
            migrations: self.migrations.load(Ordering::Relaxed),
            side_flips: self.side_flips.load(Ordering::Relaxed),
            applier_panics: self.applier_panics.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            orders_reaped: self.orders_reaped.load(Ordering::Relaxed),
            reaper_misses: self.reaper_misses.load(Ordering::Relaxed),
        }
    }

    /// Export as a BTreeMap for Prometheus-style exposition.
    pub fn export(&self) -> BTreeMap<String, u64> {
        let s = self.snapshot();
        let mut m = BTreeMap::new();
        m.insert("batches_applied".to_string(), s.batches_applied);
        m.insert("duplicates_dropped".to_string(), s.duplicates_dropped);
        m.insert("order_events".to_string(), s.order_events);
        m.insert("trade_events".to_string(), s.trade_events);
        m.insert("ignored_trades".to_string(), s.ignored_trades);
        m.insert("migrations".to_string(), s.migrations);
        m.insert("side_flips".to_string(), s.side_flips);
        m.insert("applier_panics".to_string(), s.applier_panics);
        m.insert("sweeps".to_string(), s.sweeps);
        m.insert("orders_reaped".to_string(), s.orders_reaped);
        m.insert("reaper_misses".to_string(), s.reaper_misses);
        if let Ok(tracker) = self.batch_apply_ns.lock() {
            if let Some(p99) = tracker.percentile(99) {
                m.insert("batch_apply_p99_ns".to_string(), p99);
            }
        }
        m
    }
}

impl Default for BookMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain copy of the counters at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub batches_applied: u64,
    pub duplicates_dropped: u64,
    pub order_events: u64,
    pub trade_events: u64,
    pub ignored_trades: u64,
    pub migrations: u64,
    pub side_flips: u64,
    pub applier_panics: u64,
    pub sweeps: u64,
    pub orders_reaped: u64,
    pub reaper_misses: u64,
}

/// Tracks latency samples for percentile calculation.
pub struct LatencyTracker {
    samples: Vec<u64>,
    max_samples: usize,
}

impl LatencyTracker {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: Vec::with_capacity(max_samples),
            max_samples,
        }
    }

    /// Record a latency sample, evicting the oldest once full.
    pub fn record(&mut self, value: u64) {
        if self.samples.len() >= self.max_samples {
            self.samples.remove(0);
        }
        self.samples.push(value);
    }

    /// Get a percentile value (0-100).
    pub fn percentile(&self, p: usize) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }

        let mut sorted = self.samples.clone();
        sorted.sort_unstable();

        let idx = (p as f64 / 100.0 * (sorted.len() - 1) as f64) as usize;
        Some(sorted[idx.min(sorted.len() - 1)])
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_applied_accumulates() {
        let metrics = BookMetrics::new();
        let applied = AppliedBatch {
            order_events: 3,
            trade_events: 2,
            ignored_trades: 1,
            migrations: 1,
            ..Default::default()
        };

        metrics.record_applied(&applied, 500);
        metrics.record_applied(&applied, 700);
        metrics.record_duplicate();

        let s = metrics.snapshot();
        assert_eq!(s.batches_applied, 2);
        assert_eq!(s.order_events, 6);
        assert_eq!(s.trade_events, 4);
        assert_eq!(s.ignored_trades, 2);
        assert_eq!(s.migrations, 2);
        assert_eq!(s.duplicates_dropped, 1);
    }

    #[test]
    fn test_record_sweep() {
        let metrics = BookMetrics::new();
        metrics.record_sweep(&SweepReport {
            visited: 5,
            purged: 2,
            pending: 1,
            missing: 1,
            released: 1,
        });

        let s = metrics.snapshot();
        assert_eq!(s.sweeps, 1);
        assert_eq!(s.orders_reaped, 2);
        assert_eq!(s.reaper_misses, 1);
    }

    #[test]
    fn test_latency_tracker_window() {
        let mut tracker = LatencyTracker::new(3);
        for v in [10, 20, 30, 40] {
            tracker.record(v);
        }
        assert_eq!(tracker.count(), 3);
        assert_eq!(tracker.percentile(0), Some(20));
        assert_eq!(tracker.percentile(100), Some(40));
    }

    #[test]
    fn test_export_contains_latency_once_recorded() {
        let metrics = BookMetrics::new();
        assert!(!metrics.export().contains_key("batch_apply_p99_ns"));

        metrics.record_applied(&AppliedBatch::default(), 1234);
        let exported = metrics.export();
        assert_eq!(exported["batches_applied"], 1);
        assert_eq!(exported["batch_apply_p99_ns"], 1234);
    }
}
