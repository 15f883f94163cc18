//! Shared dispatch worker pool.
//!
//! # Responsibilities
//! - Run dispatch and delivery jobs off the transport's I/O path
//! - Bound how many jobs run at once to a configured size
//! - Contain job panics so the pool keeps serving
//!
//! # Design Decisions
//! - One pool per process, injected into every element
//! - Jobs are tokio tasks gated by a fair semaphore, so queued jobs start in
//!   submission order as slots free up
//! - The in-use gauge moves on both acquire and release, including when a job
//!   panics

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::observability::metrics;

/// Fixed-size pool of dispatch slots.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    in_use: Arc<AtomicUsize>,
    size: usize,
}

/// A taken slot. Releasing it updates the gauge before the permit returns.
struct Slot {
    _permit: OwnedSemaphorePermit,
    in_use: Arc<AtomicUsize>,
}

impl Slot {
    fn new(permit: OwnedSemaphorePermit, in_use: Arc<AtomicUsize>) -> Self {
        let now = in_use.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::record_pool_in_use(now);
        Self {
            _permit: permit,
            in_use,
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        let now = self.in_use.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::record_pool_in_use(now);
    }
}

impl WorkerPool {
    /// Create a pool running at most `size` jobs concurrently.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            in_use: Arc::new(AtomicUsize::new(0)),
            size,
        }
    }

    /// Queue `job`. The handle yields `None` if the pool was closed before
    /// the job could start.
    pub fn submit<F>(&self, job: F) -> JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let in_use = Arc::clone(&self.in_use);
        tokio::spawn(async move {
            let permit = permits.acquire_owned().await.ok()?;
            let _slot = Slot::new(permit, in_use);
            Some(job.await)
        })
    }

    /// Stop accepting new jobs. Jobs already running finish normally.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots not currently taken by a running job.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Jobs currently holding a slot. This is the value exported as the
    /// pool gauge.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn bounds_concurrency() {
        let pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let running = running.clone();
                let peak = peak.clone();
                pool.submit(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_some());
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn panicking_job_releases_slot() {
        let pool = WorkerPool::new(1);
        let failed = pool.submit(async { panic!("boom") });
        assert!(failed.await.is_err());

        let ok = pool.submit(async { 7 });
        assert_eq!(ok.await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn closed_pool_skips_jobs() {
        let pool = WorkerPool::new(1);
        pool.close();
        let skipped = pool.submit(async { 1 });
        assert_eq!(skipped.await.unwrap(), None);
    }

    #[tokio::test]
    async fn gauge_drops_when_jobs_finish() {
        let pool = WorkerPool::new(2);
        let (release, gate) = tokio::sync::oneshot::channel::<()>();
        let (started_tx, started) = tokio::sync::oneshot::channel::<()>();

        let blocked = pool.submit(async move {
            let _ = started_tx.send(());
            let _ = gate.await;
        });
        started.await.unwrap();
        assert_eq!(pool.in_use(), 1);
        assert_eq!(pool.available(), 1);

        release.send(()).unwrap();
        blocked.await.unwrap();
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.available(), 2);

        let failed = pool.submit(async { panic!("boom") });
        assert!(failed.await.is_err());
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn zero_size_is_clamped() {
        assert_eq!(WorkerPool::new(0).size(), 1);
    }
}
