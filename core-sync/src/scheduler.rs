//! # Bounded Scheduler
//!
//! Fixed-concurrency task runner used by the reconcile and sweep phases.
//!
//! Each phase owns its own instance so the two ceilings are tuned and
//! accounted separately. Tasks are independent futures returning
//! [`Result<()>`](crate::Result); an error or a panic in one task is counted
//! and never cancels its siblings.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::scheduler::BoundedScheduler;
//!
//! let scheduler = BoundedScheduler::new("create", 50)?;
//! for key in keys {
//!     scheduler.submit(async move { process(key).await }).await;
//! }
//! let stats = scheduler.drain().await;
//! ```
//!
//! `submit` waits for a free slot before spawning, which keeps a lazily
//! produced input from being buffered in memory. Tasks that enqueue further
//! work from inside the pool must use [`BoundedScheduler::spawn`], which never
//! waits, or they would hold their own slot while waiting for another one.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

use crate::error::{Result, SyncError};

/// Snapshot of a scheduler's accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Tasks that returned `Ok(())`
    pub completed: u64,
    /// Tasks that returned an error or panicked
    pub failed: u64,
    /// Highest number of tasks observed running at once
    pub peak_in_flight: usize,
}

struct Inner {
    name: &'static str,
    max_concurrency: usize,
    permits: Arc<Semaphore>,
    pending: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
    idle: Notify,
}

impl Inner {
    fn finish(&self, succeeded: bool) {
        if succeeded {
            self.completed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }

        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Runs at most `max_concurrency` submitted tasks at a time.
///
/// Cloning yields another handle to the same pool, which is how tasks submit
/// follow-up work.
#[derive(Clone)]
pub struct BoundedScheduler {
    inner: Arc<Inner>,
}

impl BoundedScheduler {
    /// Create a scheduler; `name` only labels it in `Debug` output.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Config` when `max_concurrency` is zero.
    pub fn new(name: &'static str, max_concurrency: usize) -> Result<Self> {
        if max_concurrency == 0 {
            return Err(SyncError::Config(format!(
                "Scheduler '{}' needs a concurrency of at least 1",
                name
            )));
        }

        Ok(Self {
            inner: Arc::new(Inner {
                name,
                max_concurrency,
                permits: Arc::new(Semaphore::new(max_concurrency)),
                pending: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
                completed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                idle: Notify::new(),
            }),
        })
    }

    pub fn max_concurrency(&self) -> usize {
        self.inner.max_concurrency
    }

    /// Wait for a free slot, then start `task`.
    pub async fn submit<F>(&self, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.inner.pending.fetch_add(1, Ordering::SeqCst);

        match self.inner.permits.clone().acquire_owned().await {
            Ok(permit) => {
                tokio::spawn(Self::run(self.inner.clone(), permit, task));
            }
            Err(_) => self.inner.finish(false),
        }
    }

    /// Queue `task` without waiting; it starts once a slot frees up.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.inner.pending.fetch_add(1, Ordering::SeqCst);

        let inner = self.inner.clone();
        tokio::spawn(async move {
            match inner.permits.clone().acquire_owned().await {
                Ok(permit) => Self::run(inner, permit, task).await,
                Err(_) => inner.finish(false),
            }
        });
    }

    async fn run<F>(inner: Arc<Inner>, permit: OwnedSemaphorePermit, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let running = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        inner.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        let outcome = AssertUnwindSafe(task).catch_unwind().await;

        inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        drop(permit);

        inner.finish(matches!(outcome, Ok(Ok(()))));
    }

    /// Wait until every submitted task has finished, including tasks
    /// submitted by other tasks while draining.
    pub async fn drain(&self) -> SchedulerStats {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inner.pending.load(Ordering::SeqCst) == 0 {
                break;
            }
            notified.await;
        }

        self.stats()
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            completed: self.inner.completed.load(Ordering::SeqCst),
            failed: self.inner.failed.load(Ordering::SeqCst),
            peak_in_flight: self.inner.peak_in_flight.load(Ordering::SeqCst),
        }
    }
}

impl std::fmt::Debug for BoundedScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedScheduler")
            .field("name", &self.inner.name)
            .field("max_concurrency", &self.inner.max_concurrency)
            .field("pending", &self.inner.pending.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn run_synthetic(ceiling: usize, tasks: usize) -> SchedulerStats {
        let scheduler = BoundedScheduler::new("test", ceiling).unwrap();
        for i in 0..tasks {
            scheduler
                .submit(async move {
                    tokio::time::sleep(Duration::from_millis((i % 3) as u64 + 1)).await;
                    Ok(())
                })
                .await;
        }
        scheduler.drain().await
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_ceiling_of_one() {
        let stats = run_synthetic(1, 200).await;
        assert_eq!(stats.completed, 200);
        assert_eq!(stats.peak_in_flight, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_ceiling_of_five() {
        let stats = run_synthetic(5, 200).await;
        assert_eq!(stats.completed, 200);
        assert!(stats.peak_in_flight <= 5);
        assert!(stats.peak_in_flight >= 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_ceiling_of_fifty() {
        let stats = run_synthetic(50, 200).await;
        assert_eq!(stats.completed, 200);
        assert!(stats.peak_in_flight <= 50);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(matches!(
            BoundedScheduler::new("create", 0),
            Err(SyncError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_drain_without_tasks_returns_immediately() {
        let scheduler = BoundedScheduler::new("idle", 3).unwrap();
        assert_eq!(scheduler.drain().await, SchedulerStats::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failures_are_isolated() {
        let scheduler = BoundedScheduler::new("mixed", 4).unwrap();

        for i in 0..20 {
            scheduler
                .submit(async move {
                    if i % 4 == 0 {
                        Err(SyncError::InvalidKey(format!("key-{}", i)))
                    } else {
                        Ok(())
                    }
                })
                .await;
        }
        let explode = true;
        scheduler
            .submit(async move {
                if explode {
                    panic!("task blew up");
                }
                Ok(())
            })
            .await;

        let stats = scheduler.drain().await;
        assert_eq!(stats.completed, 15);
        assert_eq!(stats.failed, 6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drain_waits_for_nested_tasks() {
        let scheduler = BoundedScheduler::new("nested", 1).unwrap();
        let done = Arc::new(AtomicU64::new(0));

        for _ in 0..5 {
            let child_scheduler = scheduler.clone();
            let done = done.clone();
            scheduler
                .submit(async move {
                    let child_done = done.clone();
                    child_scheduler.spawn(async move {
                        tokio::time::sleep(Duration::from_millis(2)).await;
                        child_done.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    });
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await;
        }

        let stats = scheduler.drain().await;
        assert_eq!(done.load(Ordering::SeqCst), 10);
        assert_eq!(stats.completed, 10);
        assert_eq!(stats.peak_in_flight, 1);
    }
}
