//! # Sync Coordinator
//!
//! Runs one reconciliation of a container against its sidecar tree.
//!
//! ## Workflow
//!
//! 1. Take the run stamp from the clock
//! 2. Optionally count matching objects (advisory, feeds progress totals)
//! 3. Reconcile: create or restamp one record per listed object
//! 4. Optionally sweep: delete records not stamped by this run
//! 5. Emit the run summary
//!
//! A listing failure during reconcile aborts the run before the sweep, so a
//! partial listing never deletes records. Every other error is counted and
//! reported in the [`RunSummary`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::SyncCoordinator;
//!
//! let coordinator = SyncCoordinator::new(config, provider, fs, clock, events)?;
//! let summary = coordinator.run().await?;
//! println!("created {} deleted {}", summary.created, summary.deleted);
//! ```

use bridge_traits::storage::{FileSystemAccess, StorageProvider};
use bridge_traits::time::Clock;
use core_runtime::config::SidecarConfig;
use core_runtime::events::{EventBus, SyncEvent, SyncPhase};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::job::{ReconcileStats, RunStamp, RunSummary, SweepStats, SyncRun};
use crate::lister::RemoteLister;
use crate::reconciler::Reconciler;
use crate::scheduler::BoundedScheduler;
use crate::sidecar::SidecarStore;
use crate::sweeper::OrphanSweeper;
use crate::Result;

/// Sequences the phases of a sync run.
pub struct SyncCoordinator {
    config: Arc<SidecarConfig>,
    container: String,
    lister: RemoteLister,
    store: SidecarStore,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl SyncCoordinator {
    /// Wire a coordinator for the container served by `provider`.
    ///
    /// # Errors
    ///
    /// `SyncError::Config` when the configuration fails validation or the
    /// container name cannot namespace the sidecar tree.
    pub fn new(
        config: Arc<SidecarConfig>,
        provider: Arc<dyn StorageProvider>,
        fs: Arc<dyn FileSystemAccess>,
        clock: Arc<dyn Clock>,
        events: EventBus,
    ) -> Result<Self> {
        config.validate()?;

        let container = provider.container_name().to_string();
        let store = SidecarStore::new(fs, &config.sidecar_root, &container)?;
        let lister = RemoteLister::from_config(provider, &config);

        Ok(Self {
            config,
            container,
            lister,
            store,
            clock,
            events,
        })
    }

    pub fn store(&self) -> &SidecarStore {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Execute a run stamped with the current time.
    pub async fn run(&self) -> Result<RunSummary> {
        let stamp = RunStamp::from_clock(self.clock.as_ref());
        self.run_with_stamp(stamp).await
    }

    /// Execute a run with an explicit stamp.
    ///
    /// # Errors
    ///
    /// Only fatal errors (the remote listing failed) are returned.
    #[instrument(skip(self), fields(container = %self.container))]
    pub async fn run_with_stamp(&self, stamp: RunStamp) -> Result<RunSummary> {
        let mut run = SyncRun::new(stamp);
        self.events.emit(SyncEvent::RunStarted {
            run_stamp: stamp.value(),
        });
        info!(run_stamp = %stamp, sweep = self.config.sweep_enabled, "Starting sync run");

        if self.config.show_total {
            run.total = self.count_phase().await;
        }

        let reconcile = match self.reconcile_phase(&run).await {
            Ok(stats) => stats,
            Err(e) => {
                error!(run_stamp = %stamp, error = %e, "Sync run aborted");
                self.events.emit(SyncEvent::RunFailed {
                    run_stamp: stamp.value(),
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        let sweep = if self.config.sweep_enabled {
            Some(self.sweep_phase(stamp).await)
        } else {
            None
        };

        let summary = run.summary(reconcile, sweep);
        info!(
            run_stamp = %stamp,
            processed = summary.processed,
            created = summary.created,
            restamped = summary.restamped,
            deleted = summary.deleted,
            failed = summary.failed,
            duration_ms = summary.duration_ms,
            "Sync run completed"
        );
        self.events.emit(SyncEvent::RunCompleted {
            run_stamp: stamp.value(),
            created: summary.created,
            restamped: summary.restamped,
            deleted: summary.deleted,
            failed: summary.failed,
            duration_ms: summary.duration_ms,
        });

        Ok(summary)
    }

    /// Advisory total; failures only lose the progress ratio.
    async fn count_phase(&self) -> Option<u64> {
        self.events.emit(SyncEvent::PhaseStarted {
            phase: SyncPhase::Counting,
        });

        match self.lister.count_matching().await {
            Ok(total) => {
                info!(total, "Counted matching remote objects");
                self.events.emit(SyncEvent::TotalCounted { total });
                Some(total)
            }
            Err(e) => {
                warn!(error = %e, "Counting pass failed, continuing without total");
                None
            }
        }
    }

    async fn reconcile_phase(&self, run: &SyncRun) -> Result<ReconcileStats> {
        let started = Instant::now();
        self.events.emit(SyncEvent::PhaseStarted {
            phase: SyncPhase::Reconcile,
        });

        let scheduler = BoundedScheduler::new("create", self.config.create_concurrency)?;
        let reconciler = Reconciler::new(self.store.clone(), scheduler, self.config.sweep_enabled)
            .with_progress(self.events.clone(), run.total);

        let stats = reconciler
            .reconcile(run.stamp, self.lister.list_matching())
            .await?;

        self.events.emit(SyncEvent::PhaseCompleted {
            phase: SyncPhase::Reconcile,
            processed: stats.processed,
            changed: stats.created,
            failed: stats.failed,
            duration_ms: started.elapsed().as_millis() as u64,
        });
        Ok(stats)
    }

    /// Never fatal: an unreadable tree is reported as one failure.
    async fn sweep_phase(&self, stamp: RunStamp) -> SweepStats {
        let started = Instant::now();
        self.events.emit(SyncEvent::PhaseStarted {
            phase: SyncPhase::Sweep,
        });

        let stats = match BoundedScheduler::new("delete", self.config.delete_concurrency) {
            Ok(scheduler) => {
                let sweeper = OrphanSweeper::new(self.store.clone(), scheduler)
                    .with_progress(self.events.clone());
                match sweeper.sweep(stamp).await {
                    Ok(stats) => stats,
                    Err(e) => {
                        error!(error = %e, "Sweep could not enumerate sidecar records");
                        SweepStats {
                            failed: 1,
                            ..SweepStats::default()
                        }
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Sweep skipped");
                SweepStats {
                    failed: 1,
                    ..SweepStats::default()
                }
            }
        };

        self.events.emit(SyncEvent::PhaseCompleted {
            phase: SyncPhase::Sweep,
            processed: stats.scanned,
            changed: stats.deleted,
            failed: stats.failed,
            duration_ms: started.elapsed().as_millis() as u64,
        });
        stats
    }
}
