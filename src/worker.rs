//! Worker thread implementation.
//!
//! A [`QueueWorker`] binds one managed [`Thread`] to one shared
//! [`JobQueue`] and loops: interrupt point, dequeue (blocking on an
//! empty queue), run the job. Shutdown is flag-driven — `cancel()` sets
//! the sticky done flag, cancels whatever job is in flight and forces
//! the queue latch open so a dequeue blocked on an empty queue returns.

use crate::job::Job;
use crate::job_queue::JobQueue;
use crate::thread::{self, Interrupted, Thread, ThreadContext, ThreadTask};
use crossbeam_utils::Backoff;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct WorkerShared {
    queue: Mutex<Option<Arc<JobQueue>>>,
    current: Mutex<Option<Arc<Job>>>,
    /// Sticky shutdown flag.
    done: AtomicBool,
}

struct WorkerLoop {
    shared: Arc<WorkerShared>,
}

impl WorkerLoop {
    fn next_job(&self) -> Option<Arc<Job>> {
        let queue = self.shared.queue.lock().clone();
        if self.shared.done.load(Ordering::SeqCst) {
            return None;
        }
        queue.and_then(|queue| queue.next_job(true))
    }
}

impl ThreadTask for WorkerLoop {
    fn run(&self, ctx: &ThreadContext) -> Result<(), Interrupted> {
        let shared = &self.shared;
        let mut first_time = true;
        let mut job: Option<Arc<Job>> = None;
        loop {
            ctx.interrupt_point()?;
            let valid_queue = shared.queue.lock().is_some();
            job = self.next_job();

            if job.is_some() && !shared.done.load(Ordering::SeqCst) {
                if let Some(current) = job.take() {
                    *shared.current.lock() = Some(Arc::clone(&current));
                    if current.is_ready() {
                        current.start();
                    }
                    *shared.current.lock() = None;
                }
            }

            if first_time {
                thread::yield_now();
                first_time = false;
            }
            if shared.done.load(Ordering::SeqCst) || !valid_queue {
                break;
            }
        }

        *shared.current.lock() = None;
        // a job dequeued but never started is handed back as canceled
        if let Some(job) = job {
            if shared.done.load(Ordering::SeqCst) && job.is_ready() {
                job.cancel();
            }
        }
        Ok(())
    }
}

/// A worker thread dedicated to draining one job queue.
///
/// Attaching a queue starts the thread; `cancel()` shuts it down in
/// bounded time even if it is parked on an empty queue. Dropping the
/// worker cancels it first.
pub struct QueueWorker {
    thread: Thread,
    shared: Arc<WorkerShared>,
}

impl QueueWorker {
    /// Creates a worker. With `Some(queue)` the thread starts
    /// immediately; with `None` it stays idle until a queue is attached.
    pub fn new(queue: Option<Arc<JobQueue>>) -> Self {
        let shared = Arc::new(WorkerShared::default());
        let thread = Thread::with_name(
            WorkerLoop {
                shared: Arc::clone(&shared),
            },
            "queue-worker",
        );
        let worker = QueueWorker { thread, shared };
        worker.set_job_queue(queue);
        worker
    }

    /// Rebinds the worker to `queue`. Safe while the worker is running:
    /// the thread is paused, the old queue's latch is re-released until
    /// the loop parks, and only then is the reference swapped. A newly
    /// attached queue starts the thread if it is not running yet.
    pub fn set_job_queue(&self, queue: Option<Arc<JobQueue>>) {
        {
            let current = self.shared.queue.lock();
            let unchanged = match (&*current, &queue) {
                (Some(old), Some(new)) => Arc::ptr_eq(old, new),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                return;
            }
        }

        self.thread.pause();
        let backoff = Backoff::new();
        while self.thread.is_running() && !self.thread.is_paused() {
            if let Some(old) = self.shared.queue.lock().clone() {
                old.release_block();
            }
            backoff.snooze();
        }
        *self.shared.queue.lock() = queue.clone();
        self.thread.resume();

        if queue.is_some() && !self.thread.is_running() {
            self.thread.start();
        }
    }

    /// The queue this worker drains, if any.
    pub fn job_queue(&self) -> Option<Arc<JobQueue>> {
        self.shared.queue.lock().clone()
    }

    /// The job presently executing on this worker, if any.
    pub fn current_job(&self) -> Option<Arc<Job>> {
        self.shared.current.lock().clone()
    }

    /// Cancels the job presently executing, if any.
    pub fn cancel_current_job(&self) {
        if let Some(job) = self.current_job() {
            job.cancel();
        }
    }

    /// Whether a queue is attached.
    pub fn has_queue(&self) -> bool {
        self.shared.queue.lock().is_some()
    }

    /// Raises or clears the shutdown flag. Raising it releases the
    /// current job's internal block (if its body uses one) and the
    /// queue latch so the loop can observe the flag.
    pub fn set_done(&self, done: bool) {
        if self.shared.done.swap(done, Ordering::SeqCst) == done {
            return;
        }
        if done {
            if let Some(job) = self.current_job() {
                job.release();
            }
            if let Some(queue) = self.job_queue() {
                queue.release_block();
            }
        }
    }

    /// Whether the shutdown flag is set.
    pub fn is_done(&self) -> bool {
        self.shared.done.load(Ordering::SeqCst)
    }

    /// Shuts the worker down: sets the done flag, cancels the in-flight
    /// job and re-releases the queue latch until the loop exits. Safe to
    /// call more than once.
    pub fn cancel(&self) {
        if !self.thread.is_running() {
            return;
        }
        log::debug!("canceling queue worker");
        self.shared.done.store(true, Ordering::SeqCst);
        if let Some(job) = self.current_job() {
            job.cancel();
        }
        if let Some(queue) = self.job_queue() {
            queue.release_block();
        }

        // keep re-releasing the latch in case a wakeup is lost
        let backoff = Backoff::new();
        while self.thread.is_running() {
            if let Some(queue) = self.job_queue() {
                queue.release_block();
            }
            backoff.snooze();
        }
    }

    /// Whether the attached queue is empty. `true` with no queue.
    pub fn is_empty(&self) -> bool {
        self.job_queue().map_or(true, |queue| queue.is_empty())
    }

    /// Whether a job is presently executing on this worker.
    pub fn is_processing_job(&self) -> bool {
        self.shared.current.lock().is_some()
    }

    /// Whether work remains: a non-empty queue or an in-flight job.
    pub fn has_jobs_to_process(&self) -> bool {
        let queued = self.job_queue().map_or(false, |queue| !queue.is_empty());
        queued || self.is_processing_job()
    }

    pub fn start(&self) {
        self.thread.start();
    }

    pub fn pause(&self) {
        self.thread.pause();
    }

    pub fn resume(&self) {
        self.thread.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.thread.is_paused()
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_running()
    }

    pub fn wait_for_completion(&self) {
        self.thread.wait_for_completion();
    }
}

impl Drop for QueueWorker {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;
    use crate::job::JobWork;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    fn counting_job(counter: &Arc<AtomicUsize>) -> Arc<Job> {
        let counter = Arc::clone(counter);
        Job::new(move |_job: &Arc<Job>| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn wait_until(deadline: Duration, condition: impl Fn() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if condition() {
                return true;
            }
            thread::sleep_millis(5);
        }
        condition()
    }

    #[test]
    fn worker_drains_queued_jobs() {
        let queue = JobQueue::new();
        let worker = QueueWorker::new(Some(Arc::clone(&queue)));
        let ran = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            queue.add(counting_job(&ran), true);
        }

        assert!(wait_until(Duration::from_secs(5), || {
            ran.load(Ordering::SeqCst) == 5
        }));

        worker.cancel();
        worker.wait_for_completion();
        assert!(!worker.is_running());
    }

    #[test]
    fn worker_without_queue_stays_idle() {
        let worker = QueueWorker::new(None);
        assert!(!worker.is_running());
        assert!(!worker.has_queue());
        assert!(!worker.has_jobs_to_process());
    }

    #[test]
    fn cancel_releases_a_worker_parked_on_an_empty_queue() {
        let queue = JobQueue::new();
        let worker = QueueWorker::new(Some(Arc::clone(&queue)));
        thread::sleep_millis(50);

        let start = Instant::now();
        worker.cancel();
        worker.wait_for_completion();
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn cancel_is_idempotent() {
        let queue = JobQueue::new();
        let worker = QueueWorker::new(Some(queue));
        worker.cancel();
        worker.cancel();
        assert!(!worker.is_running());
    }

    #[test]
    fn jobs_added_after_cancel_are_not_run() {
        let queue = JobQueue::new();
        let worker = QueueWorker::new(Some(Arc::clone(&queue)));
        worker.cancel();

        let ran = Arc::new(AtomicUsize::new(0));
        queue.add(counting_job(&ran), true);
        thread::sleep_millis(100);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(queue.size(), 1);
    }

    #[test]
    fn rebinding_moves_the_worker_to_the_new_queue() {
        let first = JobQueue::new();
        let second = JobQueue::new();
        let worker = QueueWorker::new(Some(Arc::clone(&first)));
        let ran = Arc::new(AtomicUsize::new(0));

        // give the loop a moment to reach its first dequeue
        thread::sleep_millis(20);
        worker.set_job_queue(Some(Arc::clone(&second)));
        second.add(counting_job(&ran), true);

        assert!(wait_until(Duration::from_secs(5), || {
            ran.load(Ordering::SeqCst) == 1
        }));
        assert!(Arc::ptr_eq(&worker.job_queue().unwrap(), &second));

        worker.cancel();
        worker.wait_for_completion();
    }

    #[test]
    fn set_done_releases_the_current_jobs_internal_block() {
        // a body that parks on its own latch and relies on the release
        // hook to be let out at shutdown
        struct GatedWork {
            gate: Block,
            released: Arc<AtomicBool>,
        }

        impl JobWork for GatedWork {
            fn run(&self, _job: &Arc<Job>) {
                self.gate.block();
            }
            fn release(&self) {
                self.released.store(true, Ordering::SeqCst);
                self.gate.release();
            }
        }

        let queue = JobQueue::new();
        let worker = QueueWorker::new(Some(Arc::clone(&queue)));
        let released = Arc::new(AtomicBool::new(false));
        let job = Job::new(GatedWork {
            gate: Block::new(false),
            released: Arc::clone(&released),
        });
        queue.add(Arc::clone(&job), true);

        assert!(wait_until(Duration::from_secs(5), || {
            worker.is_processing_job()
        }));
        assert!(!worker.is_done());

        worker.set_done(true);
        assert!(worker.is_done());

        // the override let the body out, so the loop can wind down
        assert!(wait_until(Duration::from_secs(5), || {
            released.load(Ordering::SeqCst)
        }));
        worker.wait_for_completion();
        assert!(!worker.is_running());

        // set_done does not cancel: the job ran to completion
        assert!(job.is_finished());
        assert!(!job.is_canceled());
    }

    #[test]
    fn cancel_current_job_leaves_the_worker_running() {
        let queue = JobQueue::new();
        let worker = QueueWorker::new(Some(Arc::clone(&queue)));

        let victim = Job::new(|job: &Arc<Job>| {
            for _ in 0..1000 {
                thread::sleep_millis(10);
                if job.is_canceled() {
                    return;
                }
            }
        });
        queue.add(Arc::clone(&victim), true);

        assert!(wait_until(Duration::from_secs(5), || {
            worker.is_processing_job()
        }));

        worker.cancel_current_job();
        assert!(victim.is_canceled());

        // only the job was canceled: the loop survives, still bound to
        // its queue, and picks up the next job
        assert!(wait_until(Duration::from_secs(5), || {
            !worker.is_processing_job()
        }));
        assert!(worker.is_running());
        assert!(!worker.is_done());
        assert!(worker.has_queue());

        let ran = Arc::new(AtomicUsize::new(0));
        queue.add(counting_job(&ran), true);
        assert!(wait_until(Duration::from_secs(5), || {
            ran.load(Ordering::SeqCst) == 1
        }));

        worker.cancel();
        worker.wait_for_completion();
    }

    #[test]
    fn processing_state_tracks_the_current_job() {
        let queue = JobQueue::new();
        let worker = QueueWorker::new(Some(Arc::clone(&queue)));
        let ran = Arc::new(AtomicUsize::new(0));
        let slow_ran = Arc::clone(&ran);
        let job = Job::new(move |_job: &Arc<Job>| {
            thread::sleep_millis(200);
            slow_ran.fetch_add(1, Ordering::SeqCst);
        });
        queue.add(job, true);

        assert!(wait_until(Duration::from_secs(2), || {
            worker.is_processing_job()
        }));
        assert!(worker.has_jobs_to_process());

        assert!(wait_until(Duration::from_secs(2), || {
            !worker.is_processing_job()
        }));
        assert_eq!(ran.load(Ordering::SeqCst), 1);

        worker.cancel();
        worker.wait_for_completion();
    }
}
