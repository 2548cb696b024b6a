//! Journal replay for the book
//!
//! Rebuilds a `BookState` from a recorded sequence of update batches,
//! optionally running a reaper sweep after each batch to mimic the live
//! timer, and validates the result against an expected checksum.
//!
//! Same batches in the same order → identical book and checksum.

use std::time::Instant;

use tracing::{error, info};

use crate::book::{BatchOutcome, BookState};
use crate::config::BookConfig;
use crate::events::UpdateBatch;
use crate::reaper::Reaper;

/// Metrics collected during replay.
#[derive(Debug, Clone)]
pub struct ReplayMetrics {
    pub batches_replayed: u64,
    pub batches_applied: u64,
    pub duplicates_dropped: u64,
    pub orders_reaped: u64,
    pub duration_ms: u128,
    pub batches_per_second: f64,
    /// Book checksum after replay.
    pub state_checksum: String,
}

#[derive(Debug)]
pub struct ReplayResult {
    pub book: BookState,
    /// Orders still awaiting their grace period.
    pub pending_reaps: usize,
    pub metrics: ReplayMetrics,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    #[error("malformed journal line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("state checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}

/// Parse a JSON-lines journal, one `UpdateBatch` per line.
///
/// Blank lines are skipped. Line numbers in errors are 1-based.
pub fn parse_journal(input: &str) -> Result<Vec<UpdateBatch>, ReplayError> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| ReplayError::Malformed {
                line: i + 1,
                reason: e.to_string(),
            })
        })
        .collect()
}

pub struct ReplayEngine {
    config: BookConfig,
    expected_checksum: Option<String>,
    /// Sweep the reaper after every batch.
    sweep_each_batch: bool,
}

impl ReplayEngine {
    pub fn new(config: BookConfig) -> Self {
        Self {
            config,
            expected_checksum: None,
            sweep_each_batch: false,
        }
    }

    /// Set the expected state checksum for post-replay validation.
    pub fn with_expected_checksum(mut self, checksum: String) -> Self {
        self.expected_checksum = Some(checksum);
        self
    }

    pub fn with_reaper_sweeps(mut self) -> Self {
        self.sweep_each_batch = true;
        self
    }

    pub fn replay(&self, batches: &[UpdateBatch]) -> Result<ReplayResult, ReplayError> {
        let start = Instant::now();

        info!(batch_count = batches.len(), "Starting journal replay");

        let mut book = BookState::new(&self.config);
        let mut reaper = Reaper::new();
        let mut batches_applied = 0u64;
        let mut duplicates_dropped = 0u64;
        let mut orders_reaped = 0u64;

        for batch in batches {
            match book.apply_batch(batch) {
                BatchOutcome::Applied(applied) => {
                    batches_applied += 1;
                    reaper.enqueue(applied.flagged);
                }
                BatchOutcome::Duplicate(_) => duplicates_dropped += 1,
            }
            if self.sweep_each_batch {
                orders_reaped += reaper.sweep(&mut book).purged as u64;
            }
        }

        let duration_ms = start.elapsed().as_millis();
        let batches_replayed = batches.len() as u64;
        let batches_per_second = if duration_ms > 0 {
            (batches_replayed as f64 / duration_ms as f64) * 1000.0
        } else {
            batches_replayed as f64
        };

        let state_checksum = book.checksum();

        if let Some(ref expected) = self.expected_checksum {
            if &state_checksum != expected {
                error!(
                    expected = %expected,
                    actual = %state_checksum,
                    "State checksum mismatch after replay"
                );
                return Err(ReplayError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual: state_checksum,
                });
            }
        }

        let metrics = ReplayMetrics {
            batches_replayed,
            batches_applied,
            duplicates_dropped,
            orders_reaped,
            duration_ms,
            batches_per_second,
            state_checksum,
        };

        info!(
            batches_replayed = metrics.batches_replayed,
            duplicates = metrics.duplicates_dropped,
            reaped = metrics.orders_reaped,
            duration_ms = metrics.duration_ms,
            bps = %format!("{:.0}", metrics.batches_per_second),
            "Replay completed successfully"
        );

        Ok(ReplayResult {
            book,
            pending_reaps: reaper.pending_len(),
            metrics,
        })
    }
}

impl Default for ReplayEngine {
    fn default() -> Self {
        Self::new(BookConfig::default())
    }
}
