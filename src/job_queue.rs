//! Thread-safe FIFO of jobs with a blocking dequeue.
//!
//! Producers [`add`](JobQueue::add) jobs; consumer threads drain them
//! with [`next_job`](JobQueue::next_job), optionally suspending on an
//! embedded [`Block`] while the queue is empty. Membership is by
//! identity, dispatch is strictly FIFO — a job's priority field is not
//! consulted.
//!
//! An optional [`QueueCallback`] observes add and remove traffic. Queue
//! callbacks are always invoked with the queue lock released, so a
//! callback may call back into the queue without deadlocking.
//!
//! ```no_run
//! use jobmill::{thread, Job, JobQueue, QueueWorker};
//! use std::sync::Arc;
//!
//! let queue = JobQueue::new();
//! let worker = QueueWorker::new(Some(Arc::clone(&queue)));
//!
//! queue.add(
//!     Job::new(|_job: &Arc<Job>| {
//!         thread::sleep_seconds(2);
//!     }),
//!     true,
//! );
//!
//! thread::sleep_seconds(5);
//! worker.cancel();
//! worker.wait_for_completion();
//! ```

use crate::block::Block;
use crate::job::Job;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

/// Observer for queue traffic. All methods default to no-ops.
#[allow(unused_variables)]
pub trait QueueCallback: Send + Sync {
    /// Called just before `job` is appended.
    fn adding(&self, queue: &Arc<JobQueue>, job: &Arc<Job>) {}

    /// Called after `job` has been appended.
    fn added(&self, queue: &Arc<JobQueue>, job: &Arc<Job>) {}

    /// Called after `job` has been removed.
    fn removed(&self, queue: &Arc<JobQueue>, job: &Arc<Job>) {}
}

struct QueueInner {
    jobs: VecDeque<Arc<Job>>,
    callback: Option<Arc<dyn QueueCallback>>,
}

/// A shared FIFO of jobs feeding one or more worker threads.
pub struct JobQueue {
    me: Weak<JobQueue>,
    inner: Mutex<QueueInner>,
    /// Latch the consumers park on while the queue is empty.
    block: Block,
}

impl JobQueue {
    /// Creates an empty queue.
    pub fn new() -> Arc<JobQueue> {
        Arc::new_cyclic(|me| JobQueue {
            me: me.clone(),
            inner: Mutex::new(QueueInner {
                jobs: VecDeque::new(),
                callback: None,
            }),
            block: Block::new(false),
        })
    }

    /// Appends `job` and signals the not-empty latch. With
    /// `guarantee_unique`, a job already present by identity is not
    /// appended again — but the latch is still signaled so parked
    /// consumers re-check. The job is marked READY on its way in.
    pub fn add(&self, job: Arc<Job>, guarantee_unique: bool) {
        let callback = {
            let inner = self.inner.lock();
            if guarantee_unique && inner.jobs.iter().any(|queued| Arc::ptr_eq(queued, &job)) {
                self.block.set(true);
                return;
            }
            inner.callback.clone()
        };

        let me = self.me.upgrade();
        if let (Some(callback), Some(queue)) = (&callback, &me) {
            callback.adding(queue, &job);
        }
        job.ready();
        self.inner.lock().jobs.push_back(Arc::clone(&job));
        if let (Some(callback), Some(queue)) = (&callback, &me) {
            callback.added(queue, &job);
        }
        self.block.set(true);
    }

    /// Removes and returns the first job with the given name.
    pub fn remove_by_name(&self, name: &str) -> Option<Arc<Job>> {
        if name.is_empty() {
            return None;
        }
        self.remove_first(|job| job.name() == name)
    }

    /// Removes and returns the first job with the given id.
    pub fn remove_by_id(&self, id: &str) -> Option<Arc<Job>> {
        if id.is_empty() {
            return None;
        }
        self.remove_first(|job| job.id() == id)
    }

    /// Removes `job` by identity.
    pub fn remove(&self, job: &Arc<Job>) {
        self.remove_first(|queued| Arc::ptr_eq(queued, job));
    }

    fn remove_first(&self, matches: impl Fn(&Arc<Job>) -> bool) -> Option<Arc<Job>> {
        let (removed, callback, not_empty) = {
            let mut inner = self.inner.lock();
            let index = inner.jobs.iter().position(|job| matches(job));
            let removed = index.and_then(|index| inner.jobs.remove(index));
            (removed, inner.callback.clone(), !inner.jobs.is_empty())
        };
        self.block.set(not_empty);

        if let Some(job) = &removed {
            if let (Some(callback), Some(queue)) = (&callback, &self.me.upgrade()) {
                callback.removed(queue, job);
            }
        }
        removed
    }

    /// Erases every job whose FINISHED bit is set.
    pub fn remove_stopped_jobs(&self) {
        let (removed, callback) = {
            let mut inner = self.inner.lock();
            let mut removed = Vec::new();
            inner.jobs.retain(|job| {
                if job.is_stopped() {
                    removed.push(Arc::clone(job));
                    false
                } else {
                    true
                }
            });
            (removed, inner.callback.clone())
        };

        if let (Some(callback), Some(queue)) = (callback, self.me.upgrade()) {
            for job in &removed {
                callback.removed(&queue, job);
            }
        }
    }

    /// Drains the queue, reporting every former member as removed.
    pub fn clear(&self) {
        let (removed, callback) = {
            let mut inner = self.inner.lock();
            (std::mem::take(&mut inner.jobs), inner.callback.clone())
        };

        if let (Some(callback), Some(queue)) = (callback, self.me.upgrade()) {
            for job in &removed {
                callback.removed(&queue, job);
            }
        }
    }

    /// Takes the next runnable job. Canceled jobs at the head are
    /// unlinked and marked finished rather than returned. With
    /// `block_if_empty`, an empty queue suspends the caller on the latch
    /// until a producer signals it (or [`release_block`](Self::release_block)
    /// forces it open); otherwise `None` comes back immediately.
    pub fn next_job(&self, block_if_empty: bool) -> Option<Arc<Job>> {
        if block_if_empty && self.is_empty() {
            self.block.block();
        }

        let (result, canceled) = {
            let mut inner = self.inner.lock();
            if inner.jobs.is_empty() {
                self.block.set(false);
                return None;
            }

            let mut canceled = Vec::new();
            loop {
                let skip = match inner.jobs.front() {
                    Some(job) => job.is_canceled(),
                    None => break,
                };
                if !skip {
                    break;
                }
                if let Some(job) = inner.jobs.pop_front() {
                    canceled.push(job);
                }
            }
            let result = inner.jobs.pop_front();
            self.block.set(!inner.jobs.is_empty());
            (result, canceled)
        };

        // complete the cancels with the queue lock released
        for job in canceled {
            job.finished();
        }
        result
    }

    /// Forces open the latch, releasing any consumer suspended in
    /// [`next_job`](Self::next_job).
    pub fn release_block(&self) {
        self.block.release();
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().jobs.is_empty()
    }

    pub fn size(&self) -> usize {
        self.inner.lock().jobs.len()
    }

    /// Attaches the traffic observer.
    pub fn set_callback(&self, callback: Arc<dyn QueueCallback>) {
        self.inner.lock().callback = Some(callback);
    }

    /// The traffic observer, if any.
    pub fn callback(&self) -> Option<Arc<dyn QueueCallback>> {
        self.inner.lock().callback.clone()
    }
}
