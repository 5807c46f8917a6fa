//! # Reconciler
//!
//! Ensures every listed object has exactly one sidecar record stamped with
//! the current run.
//!
//! For each object a task is submitted to the creation-phase scheduler:
//!
//! 1. derive the record path
//! 2. no record yet: create one (empty `data` and `status`)
//! 3. record present and restamping enabled: refresh `init_blob_time` only
//!
//! Errors are counted per object and never stop the phase. The end state
//! depends only on the set of listed objects, not on their order.

use core_runtime::events::{EventBus, SyncEvent, SyncPhase};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::Result;
use crate::job::{ReconcileStats, RunCounters, RunStamp};
use crate::lister::RemoteObject;
use crate::scheduler::BoundedScheduler;
use crate::sidecar::SidecarStore;

/// Emit a progress event every this many processed objects.
pub const PROGRESS_INTERVAL: u64 = 100;

/// Progress sink shared by reconcile tasks.
#[derive(Clone)]
pub(crate) struct ProgressReporter {
    events: EventBus,
    phase: SyncPhase,
    total: Option<u64>,
}

impl ProgressReporter {
    pub(crate) fn new(events: EventBus, phase: SyncPhase, total: Option<u64>) -> Self {
        Self {
            events,
            phase,
            total,
        }
    }

    pub(crate) fn report(&self, processed: u64) {
        if processed % PROGRESS_INTERVAL == 0 || Some(processed) == self.total {
            self.events.emit(SyncEvent::Progress {
                phase: self.phase,
                processed,
                total: self.total,
            });
        }
    }
}

/// Creation/restamp phase.
pub struct Reconciler {
    store: SidecarStore,
    scheduler: BoundedScheduler,
    restamp: bool,
    progress: Option<ProgressReporter>,
}

impl Reconciler {
    /// `restamp` refreshes the stamp of records that already exist; without
    /// it existing records are left untouched.
    pub fn new(store: SidecarStore, scheduler: BoundedScheduler, restamp: bool) -> Self {
        Self {
            store,
            scheduler,
            restamp,
            progress: None,
        }
    }

    /// Publish `Progress` events while reconciling.
    pub fn with_progress(mut self, events: EventBus, total: Option<u64>) -> Self {
        self.progress = Some(ProgressReporter::new(events, SyncPhase::Reconcile, total));
        self
    }

    /// Reconcile every object of `objects`.
    ///
    /// Waits for all submitted tasks before returning, also when the stream
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns the stream's error (a transport failure) after draining; the
    /// caller must not sweep on a partial listing.
    #[instrument(skip_all, fields(run_stamp = %run_stamp))]
    pub async fn reconcile<S>(&self, run_stamp: RunStamp, objects: S) -> Result<ReconcileStats>
    where
        S: Stream<Item = Result<RemoteObject>> + Send,
    {
        let counters = Arc::new(RunCounters::new());
        let mut objects = Box::pin(objects);
        let mut listing_error = None;

        while let Some(next) = objects.next().await {
            let object = match next {
                Ok(object) => object,
                Err(e) => {
                    listing_error = Some(e);
                    break;
                }
            };

            let store = self.store.clone();
            let counters = counters.clone();
            let progress = self.progress.clone();
            let restamp = self.restamp;

            self.scheduler
                .submit(async move {
                    let result = reconcile_object(&store, &object, run_stamp, restamp, &counters).await;

                    let processed = counters.record_processed();
                    if let Err(e) = &result {
                        counters.record_failed();
                        warn!(key = %object.key, error = %e, "Failed to reconcile object");
                    }
                    if let Some(progress) = progress {
                        progress.report(processed);
                    }
                    result
                })
                .await;
        }

        self.scheduler.drain().await;

        let stats = ReconcileStats {
            processed: counters.processed(),
            created: counters.created(),
            restamped: counters.restamped(),
            failed: counters.failed(),
        };

        match listing_error {
            Some(e) => Err(e),
            None => {
                debug!(
                    processed = stats.processed,
                    created = stats.created,
                    restamped = stats.restamped,
                    failed = stats.failed,
                    "Reconcile finished"
                );
                Ok(stats)
            }
        }
    }
}

async fn reconcile_object(
    store: &SidecarStore,
    object: &RemoteObject,
    run_stamp: RunStamp,
    restamp: bool,
    counters: &RunCounters,
) -> Result<()> {
    let path = store.path_for(&object.key)?;

    // A record created by another writer after the check surfaces as
    // `AlreadyExists` and is counted as a failure.
    if !store.exists(&path).await? {
        store.create(&path, &object.url, run_stamp).await?;
        counters.record_created();
    } else if restamp {
        store.restamp(&path, run_stamp).await?;
        counters.record_restamped();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::TokioFileSystem;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::storage::FileSystemAccess;
    use bytes::Bytes;
    use futures::stream;
    use std::path::{Path, PathBuf};

    fn object(key: &str) -> RemoteObject {
        RemoteObject {
            key: key.to_string(),
            url: format!("https://acct/c/{}", key),
        }
    }

    fn reconciler(dir: &tempfile::TempDir, restamp: bool) -> (Reconciler, SidecarStore) {
        let store = SidecarStore::new(Arc::new(TokioFileSystem::new()), dir.path(), "c").unwrap();
        let scheduler = BoundedScheduler::new("create", 4).unwrap();
        (Reconciler::new(store.clone(), scheduler, restamp), store)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_creates_then_restamps() {
        let dir = tempfile::tempdir().unwrap();
        let (reconciler, store) = reconciler(&dir, true);
        let objects = || stream::iter(vec![Ok(object("a/1.wav")), Ok(object("a/2.wav"))]);

        let first = reconciler.reconcile(RunStamp::new(1), objects()).await.unwrap();
        assert_eq!(first.created, 2);
        assert_eq!(first.processed, 2);

        let second = reconciler.reconcile(RunStamp::new(2), objects()).await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.restamped, 2);

        let record = store.read(&store.path_for("a/1.wav").unwrap()).await.unwrap();
        assert_eq!(record.run_stamp, Some(RunStamp::new(2)));
        assert_eq!(record.link, "https://acct/c/a/1.wav");
    }

    #[tokio::test]
    async fn test_without_restamp_existing_records_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let (reconciler, store) = reconciler(&dir, false);

        reconciler
            .reconcile(RunStamp::new(1), stream::iter(vec![Ok(object("x.wav"))]))
            .await
            .unwrap();
        let stats = reconciler
            .reconcile(RunStamp::new(2), stream::iter(vec![Ok(object("x.wav"))]))
            .await
            .unwrap();

        assert_eq!(stats.restamped, 0);
        assert_eq!(stats.processed, 1);
        let record = store.read(&store.path_for("x.wav").unwrap()).await.unwrap();
        assert_eq!(record.run_stamp, Some(RunStamp::new(1)));
    }

    #[tokio::test]
    async fn test_bad_key_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let (reconciler, _store) = reconciler(&dir, true);

        let stats = reconciler
            .reconcile(
                RunStamp::new(1),
                stream::iter(vec![Ok(object("../escape.wav")), Ok(object("ok.wav"))]),
            )
            .await
            .unwrap();

        assert_eq!(stats.processed, 2);
        assert_eq!(stats.created, 1);
        assert_eq!(stats.failed, 1);
    }

    /// Reports every record as missing, as if another writer created it
    /// between the existence check and the create.
    struct StaleExists(TokioFileSystem);

    #[async_trait::async_trait]
    impl FileSystemAccess for StaleExists {
        async fn exists(&self, _path: &Path) -> BridgeResult<bool> {
            Ok(false)
        }

        async fn read_file(&self, path: &Path) -> BridgeResult<Bytes> {
            self.0.read_file(path).await
        }

        async fn write_file(&self, path: &Path, data: Bytes) -> BridgeResult<()> {
            self.0.write_file(path, data).await
        }

        async fn create_new_file(&self, path: &Path, data: Bytes) -> BridgeResult<()> {
            self.0.create_new_file(path, data).await
        }

        async fn delete_file(&self, path: &Path) -> BridgeResult<()> {
            self.0.delete_file(path).await
        }

        async fn list_files_recursive(&self, root: &Path, extension: &str) -> BridgeResult<Vec<PathBuf>> {
            self.0.list_files_recursive(root, extension).await
        }
    }

    #[tokio::test]
    async fn test_create_race_counts_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = SidecarStore::new(Arc::new(StaleExists(TokioFileSystem::new())), dir.path(), "c").unwrap();
        let path = store.path_for("a.wav").unwrap();
        store.create(&path, "first-writer", RunStamp::new(1)).await.unwrap();

        let reconciler = Reconciler::new(store.clone(), BoundedScheduler::new("create", 2).unwrap(), true);
        let stats = reconciler
            .reconcile(RunStamp::new(2), stream::iter(vec![Ok(object("a.wav"))]))
            .await
            .unwrap();

        assert_eq!(stats.processed, 1);
        assert_eq!(stats.created, 0);
        assert_eq!(stats.restamped, 0);
        assert_eq!(stats.failed, 1);

        let record = store.read(&path).await.unwrap();
        assert_eq!(record.link, "first-writer");
        assert_eq!(record.run_stamp, Some(RunStamp::new(1)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_repeated_key_is_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let (reconciler, store) = reconciler(&dir, true);
        let objects: Vec<_> = (0..8).map(|_| Ok(object("dup.wav"))).collect();

        let stats = reconciler.reconcile(RunStamp::new(3), stream::iter(objects)).await.unwrap();

        assert_eq!(stats.processed, 8);
        assert_eq!(stats.created, 1);
        // Duplicates either restamp the record or lose the create race.
        assert_eq!(stats.created + stats.restamped + stats.failed, 8);
        let record = store.read(&store.path_for("dup.wav").unwrap()).await.unwrap();
        assert_eq!(record.link, "https://acct/c/dup.wav");
    }

    #[tokio::test]
    async fn test_listing_error_drains_and_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let (reconciler, store) = reconciler(&dir, true);

        let err = reconciler
            .reconcile(
                RunStamp::new(1),
                stream::iter(vec![
                    Ok(object("a.wav")),
                    Err(crate::SyncError::Transport("page 2 failed".into())),
                    Ok(object("b.wav")),
                ]),
            )
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert!(store.exists(&store.path_for("a.wav").unwrap()).await.unwrap());
        assert!(!store.exists(&store.path_for("b.wav").unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn test_progress_events() {
        let dir = tempfile::tempdir().unwrap();
        let (reconciler, _store) = reconciler(&dir, true);
        let events = EventBus::new(16);
        let mut receiver = events.subscribe();
        let reconciler = reconciler.with_progress(events, Some(2));

        reconciler
            .reconcile(
                RunStamp::new(1),
                stream::iter(vec![Ok(object("a.wav")), Ok(object("b.wav"))]),
            )
            .await
            .unwrap();

        assert_eq!(
            receiver.try_recv().unwrap(),
            SyncEvent::Progress {
                phase: SyncPhase::Reconcile,
                processed: 2,
                total: Some(2),
            }
        );
    }
}
