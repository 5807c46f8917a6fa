//! # Sync & Reconciliation Module
//!
//! Mirrors the objects of a remote container into local sidecar records.
//!
//! ## Overview
//!
//! Each run:
//! - Lists remote objects via `StorageProvider`, filtered by extension
//! - Creates one sidecar record per new object, never touching existing
//!   annotation data
//! - Stamps every confirmed record with the run's stamp
//! - Sweeps records whose stamp was not refreshed by this run
//!
//! ## Components
//!
//! - **Remote Lister** (`lister`): lazy, paginated stream of matching objects
//! - **Sidecar Store** (`sidecar`): record paths, create/restamp/delete
//! - **Bounded Scheduler** (`scheduler`): fixed-concurrency task pool
//! - **Reconciler** (`reconciler`): create-or-restamp phase
//! - **Orphan Sweeper** (`sweeper`): deletion phase
//! - **Sync Coordinator** (`coordinator`): sequences the phases of a run
//! - **Run State** (`job`): run stamp, counters and summary
//! - **Query** (`query`): records still waiting for annotation

pub mod coordinator;
pub mod error;
pub mod job;
pub mod lister;
pub mod query;
pub mod reconciler;
pub mod scheduler;
pub mod sidecar;
pub mod sweeper;

pub use coordinator::SyncCoordinator;
pub use error::{Result, SyncError};
pub use job::{ReconcileStats, RunCounters, RunStamp, RunSummary, SweepStats, SyncRun};
pub use lister::{RemoteLister, RemoteObject};
pub use query::{find_unprocessed, PendingRecord};
pub use reconciler::Reconciler;
pub use scheduler::{BoundedScheduler, SchedulerStats};
pub use sidecar::{sidecar_relative_path, SidecarRecord, SidecarStore};
pub use sweeper::OrphanSweeper;
