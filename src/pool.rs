//! A pool of queue workers sharing one job queue.
//!
//! [`JobPool`] owns the queue (allocating one when the caller supplies
//! none) and a resizable collection of [`QueueWorker`]s all bound to it.
//! Producers submit through the queue; the pool manages worker
//! lifecycle.
//!
//! ```no_run
//! use jobmill::{thread, Job, JobPool};
//! use std::sync::Arc;
//!
//! let pool = JobPool::new(None, 5);
//! let queue = pool.job_queue();
//!
//! for _ in 0..10 {
//!     queue.add(
//!         Job::new(|_job: &Arc<Job>| {
//!             thread::sleep_seconds(2);
//!         }),
//!         true,
//!     );
//! }
//!
//! while pool.has_jobs_to_process() {
//!     thread::sleep_millis(10);
//! }
//!
//! pool.cancel();
//! pool.wait_for_completion();
//! ```

use crate::job_queue::JobQueue;
use crate::worker::QueueWorker;
use parking_lot::Mutex;
use std::sync::Arc;

struct PoolInner {
    queue: Arc<JobQueue>,
    workers: Vec<Arc<QueueWorker>>,
}

/// A bounded pool of worker threads draining one shared queue.
pub struct JobPool {
    inner: Mutex<PoolInner>,
}

impl JobPool {
    /// Creates a pool of `num_threads` workers. A fresh queue is
    /// allocated when `queue` is `None`.
    pub fn new(queue: Option<Arc<JobQueue>>, num_threads: usize) -> Self {
        let pool = JobPool {
            inner: Mutex::new(PoolInner {
                queue: queue.unwrap_or_else(JobQueue::new),
                workers: Vec::new(),
            }),
        };
        pool.set_number_of_threads(num_threads);
        pool
    }

    /// The queue every worker in this pool drains.
    pub fn job_queue(&self) -> Arc<JobQueue> {
        Arc::clone(&self.inner.lock().queue)
    }

    /// Rebinds the pool, and every worker in it, to `queue`.
    pub fn set_job_queue(&self, queue: Arc<JobQueue>) {
        let workers = {
            let mut inner = self.inner.lock();
            inner.queue = Arc::clone(&queue);
            inner.workers.clone()
        };
        for worker in workers {
            worker.set_job_queue(Some(Arc::clone(&queue)));
        }
    }

    /// Grows or shrinks the pool. Growth binds new workers to the shared
    /// queue; shrinking cancels and discards the tail workers.
    pub fn set_number_of_threads(&self, num_threads: usize) {
        let removed = {
            let mut inner = self.inner.lock();
            let current = inner.workers.len();
            log::debug!("resizing pool from {current} to {num_threads} workers");
            if num_threads > current {
                for _ in current..num_threads {
                    let queue = Arc::clone(&inner.queue);
                    inner.workers.push(Arc::new(QueueWorker::new(Some(queue))));
                }
                Vec::new()
            } else {
                inner.workers.split_off(num_threads)
            }
        };
        for worker in removed {
            worker.cancel();
        }
    }

    /// The number of workers in the pool.
    pub fn number_of_threads(&self) -> usize {
        self.inner.lock().workers.len()
    }

    /// How many workers are presently executing a job.
    pub fn number_of_busy_threads(&self) -> usize {
        let workers = self.inner.lock().workers.clone();
        workers
            .iter()
            .filter(|worker| worker.is_processing_job())
            .count()
    }

    /// Whether every worker is presently executing a job. Vacuously true
    /// for an empty pool.
    pub fn are_all_threads_busy(&self) -> bool {
        let workers = self.inner.lock().workers.clone();
        workers.iter().all(|worker| worker.is_processing_job())
    }

    /// Whether any worker still has work: a job in flight or a non-empty
    /// queue. A pool with no workers reports `false`.
    pub fn has_jobs_to_process(&self) -> bool {
        let workers = self.inner.lock().workers.clone();
        workers.iter().any(|worker| worker.has_jobs_to_process())
    }

    /// Cancels every worker, in order. Idempotent.
    pub fn cancel(&self) {
        let workers = self.inner.lock().workers.clone();
        for worker in workers {
            worker.cancel();
        }
    }

    /// Joins every worker. Usually called after
    /// [`cancel`](Self::cancel).
    pub fn wait_for_completion(&self) {
        let workers = self.inner.lock().workers.clone();
        for worker in workers {
            worker.wait_for_completion();
        }
    }
}

impl Drop for JobPool {
    fn drop(&mut self) {
        log::debug!("JobPool::drop() invoked");
        self.cancel();
        self.wait_for_completion();
        self.inner.lock().workers.clear();
    }
}
