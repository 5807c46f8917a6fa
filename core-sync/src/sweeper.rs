//! # Orphan Sweeper
//!
//! Deletes every sidecar record not confirmed by the current run.
//!
//! A record survives only when it is a JSON object whose `init_blob_time`
//! equals the run stamp. Its annotation fields are never inspected. Records
//! that cannot be read, or are not a JSON object, are deleted like stale ones;
//! a transient read error therefore also removes the record, and the next run
//! recreates it with empty annotation fields.
//!
//! Records are read inside the scheduled tasks, so reads share the delete
//! concurrency ceiling.
//!
//! Each record is counted once: as deleted, as failed (the delete itself
//! errored), or not at all when kept.

use core_runtime::events::{EventBus, SyncPhase};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::{Result, SyncError};
use crate::job::{RunCounters, RunStamp, SweepStats};
use crate::reconciler::ProgressReporter;
use crate::scheduler::BoundedScheduler;
use crate::sidecar::{stamp_of, SidecarStore};

/// Why a record is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    /// Stamp missing or from another run
    Stale,
    /// Unreadable, or not a JSON object
    Corrupt,
}

/// Decide the fate of one record from its raw contents.
pub fn judge(
    path: &Path,
    raw: std::result::Result<&[u8], &SyncError>,
    run_stamp: RunStamp,
) -> Verdict {
    let raw = match raw {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = ?path, error = %e, "Unreadable sidecar record");
            return Verdict::Corrupt;
        }
    };

    match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Object(object)) if stamp_of(&object) == Some(run_stamp) => Verdict::Keep,
        Ok(Value::Object(_)) => Verdict::Stale,
        Ok(_) => {
            warn!(path = ?path, "Sidecar record is not a JSON object");
            Verdict::Corrupt
        }
        Err(e) => {
            warn!(path = ?path, error = %e, "Malformed sidecar record");
            Verdict::Corrupt
        }
    }
}

/// Deletion phase.
pub struct OrphanSweeper {
    store: SidecarStore,
    scheduler: BoundedScheduler,
    progress: Option<ProgressReporter>,
}

impl OrphanSweeper {
    pub fn new(store: SidecarStore, scheduler: BoundedScheduler) -> Self {
        Self {
            store,
            scheduler,
            progress: None,
        }
    }

    /// Publish `Progress` events while sweeping.
    pub fn with_progress(mut self, events: EventBus) -> Self {
        self.progress = Some(ProgressReporter::new(events, SyncPhase::Sweep, None));
        self
    }

    /// Remove every record whose stamp differs from `run_stamp`.
    ///
    /// # Errors
    ///
    /// Only when the record tree itself cannot be enumerated. Per-record
    /// failures are counted in [`SweepStats::failed`].
    #[instrument(skip_all, fields(run_stamp = %run_stamp))]
    pub async fn sweep(&self, run_stamp: RunStamp) -> Result<SweepStats> {
        let counters = Arc::new(RunCounters::new());
        let scanned = Arc::new(AtomicU64::new(0));
        let paths = self.store.list_paths().await?;

        for path in paths {
            let store = self.store.clone();
            let counters = counters.clone();
            let scanned = scanned.clone();
            let progress = self.progress.clone();

            self.scheduler
                .submit(async move {
                    let raw = store.read_raw(&path).await;
                    let verdict = judge(&path, raw.as_deref(), run_stamp);
                    let result = sweep_record(&store, path, verdict, &counters).await;

                    let examined = scanned.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(progress) = progress {
                        progress.report(examined);
                    }
                    result
                })
                .await;
        }

        self.scheduler.drain().await;

        let stats = SweepStats {
            scanned: scanned.load(Ordering::Relaxed),
            deleted: counters.deleted(),
            failed: counters.failed(),
        };
        debug!(
            scanned = stats.scanned,
            deleted = stats.deleted,
            failed = stats.failed,
            "Sweep finished"
        );
        Ok(stats)
    }
}

async fn sweep_record(
    store: &SidecarStore,
    path: PathBuf,
    verdict: Verdict,
    counters: &RunCounters,
) -> Result<()> {
    if verdict == Verdict::Keep {
        return Ok(());
    }

    match store.delete(&path).await {
        Ok(()) => {
            counters.record_deleted();
            debug!(path = ?path, reason = ?verdict, "Removed orphaned sidecar record");
            Ok(())
        }
        Err(e) => {
            counters.record_failed();
            warn!(path = ?path, error = %e, "Failed to delete sidecar record");
            Err(e)
        }
    }
}
