//! # Sync Run State
//!
//! In-memory state for a single execution: the run stamp that marks every
//! confirmed record, and the counters accumulated by concurrent tasks.
//!
//! ```rust,ignore
//! use core_sync::job::{RunStamp, SyncRun};
//!
//! let run = SyncRun::new(RunStamp::from_clock(&SystemClock));
//! run.counters.record_created();
//! let summary = run.summary();
//! ```

use bridge_traits::time::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

// ============================================================================
// Run Stamp
// ============================================================================

/// Identifier of one run, written into `init_blob_time` of every record the
/// run confirms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunStamp(i64);

impl RunStamp {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Stamp taken from the clock's current time in milliseconds.
    pub fn from_clock(clock: &dyn Clock) -> Self {
        Self(clock.unix_timestamp_millis())
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for RunStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Counters
// ============================================================================

/// Counters shared by every task of a run.
///
/// All updates are relaxed atomic increments; readers only look at them
/// between phases or for progress display.
#[derive(Debug, Default)]
pub struct RunCounters {
    processed: AtomicU64,
    created: AtomicU64,
    restamped: AtomicU64,
    deleted: AtomicU64,
    failed: AtomicU64,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new processed count.
    pub fn record_processed(&self) -> u64 {
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_restamped(&self) {
        self.restamped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deleted(&self) {
        self.deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub fn restamped(&self) -> u64 {
        self.restamped.load(Ordering::Relaxed)
    }

    pub fn deleted(&self) -> u64 {
        self.deleted.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Phase Statistics
// ============================================================================

/// Outcome of the reconcile phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    pub processed: u64,
    pub created: u64,
    pub restamped: u64,
    pub failed: u64,
}

/// Outcome of the orphan sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepStats {
    /// Records examined
    pub scanned: u64,
    pub deleted: u64,
    pub failed: u64,
}

// ============================================================================
// Sync Run
// ============================================================================

/// A single execution of the reconciliation engine.
#[derive(Debug)]
pub struct SyncRun {
    pub stamp: RunStamp,
    /// Advisory total from the count pre-pass
    pub total: Option<u64>,
    started: Instant,
}

impl SyncRun {
    pub fn new(stamp: RunStamp) -> Self {
        Self {
            stamp,
            total: None,
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Fold both phases into the final report.
    pub fn summary(&self, reconcile: ReconcileStats, sweep: Option<SweepStats>) -> RunSummary {
        let sweep = sweep.unwrap_or_default();
        RunSummary {
            run_stamp: self.stamp,
            total: self.total,
            processed: reconcile.processed,
            created: reconcile.created,
            restamped: reconcile.restamped,
            deleted: sweep.deleted,
            failed: reconcile.failed + sweep.failed,
            duration_ms: self.elapsed_ms(),
        }
    }
}

/// Final report of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_stamp: RunStamp,
    pub total: Option<u64>,
    pub processed: u64,
    pub created: u64,
    pub restamped: u64,
    pub deleted: u64,
    pub failed: u64,
    pub duration_ms: u64,
}

impl RunSummary {
    /// True when every per-object operation succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}
