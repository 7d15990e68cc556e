//! Observable units of work.
//!
//! A [`Job`] wraps a [`JobWork`] body with a bit-flag state machine and
//! state-change notifications. READY and RUNNING are mutually exclusive
//! lifecycle bits; CANCEL is orthogonal and sticky (a canceled job may
//! not yet be finished — once FINISHED joins it, the cancel is
//! complete); FINISHED is terminal until the state is reset.
//!
//! Observers attach a [`JobCallback`] chain. Every state edge and
//! property change is emitted with the job's own lock released, so a
//! callback may safely call back into the job.
//!
//! ```no_run
//! use jobmill::{thread, Job, JobCallback};
//! use std::sync::Arc;
//!
//! struct Logger;
//!
//! impl JobCallback for Logger {
//!     fn started(&self, _job: &Arc<Job>) {
//!         println!("started");
//!     }
//!     fn finished(&self, _job: &Arc<Job>) {
//!         println!("finished");
//!     }
//! }
//!
//! let job = Job::new(|_job: &Arc<Job>| {
//!     thread::sleep_seconds(2);
//! });
//! job.set_callback(Arc::new(Logger));
//! job.start();
//! ```

use bitflags::bitflags;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

bitflags! {
    /// Job lifecycle bits. Only CANCEL may coexist with the others.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct JobState: u32 {
        const READY    = 1;
        const RUNNING  = 2;
        const CANCEL   = 4;
        const FINISHED = 8;
    }
}

/// The body of a job, supplied by the embedder. Implemented by any
/// `Fn(&Arc<Job>)` closure.
///
/// Long-running bodies should poll `job.is_canceled()` at safe points so
/// a cancel request terminates them promptly; `release` is a hook for
/// bodies that suspend on their own primitives and need an external kick
/// when the owning worker shuts down.
pub trait JobWork: Send + Sync {
    /// Performs the work. Runs on whichever worker thread dequeued the
    /// job.
    fn run(&self, job: &Arc<Job>);

    /// Releases any internal block the body may be suspended on.
    fn release(&self) {}
}

impl<F> JobWork for F
where
    F: Fn(&Arc<Job>) + Send + Sync,
{
    fn run(&self, job: &Arc<Job>) {
        self(job)
    }
}

/// A link in a job's notification chain.
///
/// Every method by default forwards to [`next`](Self::next), so a chain
/// of observers each sees every event it does not swallow. The job is
/// passed to each method and must not be stored by the callback — that
/// would create a reference cycle with the job's strong hold on the
/// chain head.
#[allow(unused_variables)]
pub trait JobCallback: Send + Sync {
    /// The next link in the chain, if any.
    fn next(&self) -> Option<Arc<dyn JobCallback>> {
        None
    }

    /// The job entered READY.
    fn ready(&self, job: &Arc<Job>) {
        if let Some(next) = self.next() {
            next.ready(job);
        }
    }

    /// The job entered RUNNING.
    fn started(&self, job: &Arc<Job>) {
        if let Some(next) = self.next() {
            next.started(job);
        }
    }

    /// The job entered FINISHED.
    fn finished(&self, job: &Arc<Job>) {
        if let Some(next) = self.next() {
            next.finished(job);
        }
    }

    /// The CANCEL bit was raised.
    fn canceled(&self, job: &Arc<Job>) {
        if let Some(next) = self.next() {
            next.canceled(job);
        }
    }

    /// The job's name changed.
    fn name_changed(&self, name: &str, job: &Arc<Job>) {
        if let Some(next) = self.next() {
            next.name_changed(name, job);
        }
    }

    /// The job's description changed.
    fn description_changed(&self, description: &str, job: &Arc<Job>) {
        if let Some(next) = self.next() {
            next.description_changed(description, job);
        }
    }

    /// The job's id changed.
    fn id_changed(&self, id: &str, job: &Arc<Job>) {
        if let Some(next) = self.next() {
            next.id_changed(id, job);
        }
    }

    /// The job reported progress.
    fn percent_complete_changed(&self, percent: f64, job: &Arc<Job>) {
        if let Some(next) = self.next() {
            next.percent_complete_changed(percent, job);
        }
    }
}

struct JobData {
    name: String,
    id: String,
    description: String,
    priority: f64,
    percent_complete: f64,
    state: JobState,
    callback: Option<Arc<dyn JobCallback>>,
}

/// An observable, stateful unit of work.
///
/// Jobs are shared by reference counting: the queue, the executing
/// worker and any observers all hold `Arc<Job>`, and queue membership is
/// by identity. Construction yields an `Arc` directly so state-change
/// callbacks can be handed the shared job.
pub struct Job {
    me: Weak<Job>,
    data: Mutex<JobData>,
    work: Box<dyn JobWork>,
}

impl Job {
    /// Creates a job around `work`, in the READY state.
    pub fn new<W>(work: W) -> Arc<Job>
    where
        W: JobWork + 'static,
    {
        Arc::new_cyclic(|me| Job {
            me: me.clone(),
            data: Mutex::new(JobData {
                name: String::new(),
                id: String::new(),
                description: String::new(),
                priority: 0.0,
                percent_complete: 0.0,
                state: JobState::READY,
                callback: None,
            }),
            work: Box::new(work),
        })
    }

    /// Runs the job on the calling thread: marks it RUNNING, invokes the
    /// body, and marks it FINISHED unless a cancel was requested in the
    /// meantime. A cancel observed during the body leaves the CANCEL bit
    /// signaled to the outside.
    pub fn start(&self) {
        self.running();
        if let Some(me) = self.me.upgrade() {
            self.work.run(&me);
        }
        if !self.is_canceled() {
            self.finished();
        }
    }

    /// Raises the CANCEL bit. Sticky until the job finishes or its state
    /// is reset.
    pub fn cancel(&self) {
        self.set_state(JobState::CANCEL, true);
    }

    /// Collapses the lifecycle bits to READY.
    pub fn ready(&self) {
        self.reset_state(JobState::READY);
    }

    /// Collapses the lifecycle bits to RUNNING.
    pub fn running(&self) {
        self.reset_state(JobState::RUNNING);
    }

    /// Marks the job FINISHED, preserving a pending CANCEL.
    pub fn finished(&self) {
        let new_state = {
            let data = self.data.lock();
            (data.state & JobState::CANCEL) | JobState::FINISHED
        };
        self.reset_state(new_state);
    }

    /// Clears the state and re-raises exactly `bits`. A no-op when the
    /// state already equals `bits`.
    pub fn reset_state(&self, bits: JobState) {
        {
            let mut data = self.data.lock();
            if data.state == bits {
                return;
            }
            data.state = JobState::empty();
        }
        self.set_state(bits, true);
    }

    /// Raises (`on`) or clears the given bits. At most one edge callback
    /// fires per call, for the highest-priority lifecycle bit that went
    /// 0 to 1, in the order READY, RUNNING, CANCEL, FINISHED.
    pub fn set_state(&self, bits: JobState, on: bool) {
        let (old, new, callback) = {
            let mut data = self.data.lock();
            let old = data.state;
            let new = if on { old | bits } else { old & !bits };
            data.state = new;
            (old, new, data.callback.clone())
        };

        if old == new {
            return;
        }
        let (callback, me) = match (callback, self.me.upgrade()) {
            (Some(callback), Some(me)) => (callback, me),
            _ => return,
        };
        if new.contains(JobState::READY) && !old.contains(JobState::READY) {
            callback.ready(&me);
        } else if new.contains(JobState::RUNNING) && !old.contains(JobState::RUNNING) {
            callback.started(&me);
        } else if new.contains(JobState::CANCEL) && !old.contains(JobState::CANCEL) {
            callback.canceled(&me);
        } else if new.contains(JobState::FINISHED) && !old.contains(JobState::FINISHED) {
            callback.finished(&me);
        }
    }

    /// The current state bits.
    pub fn state(&self) -> JobState {
        self.data.lock().state
    }

    pub fn is_ready(&self) -> bool {
        self.state().contains(JobState::READY)
    }

    pub fn is_running(&self) -> bool {
        self.state().contains(JobState::RUNNING)
    }

    pub fn is_canceled(&self) -> bool {
        self.state().contains(JobState::CANCEL)
    }

    pub fn is_finished(&self) -> bool {
        self.state().contains(JobState::FINISHED)
    }

    /// Whether the job has come to rest (its FINISHED bit is set).
    pub fn is_stopped(&self) -> bool {
        self.is_finished()
    }

    /// Releases any internal block the body is suspended on.
    pub fn release(&self) {
        self.work.release();
    }

    pub fn set_name(&self, value: impl Into<String>) {
        let value = value.into();
        let (changed, callback) = {
            let mut data = self.data.lock();
            let changed = data.name != value;
            data.name = value.clone();
            (changed, data.callback.clone())
        };
        if changed {
            if let (Some(callback), Some(me)) = (callback, self.me.upgrade()) {
                callback.name_changed(&value, &me);
            }
        }
    }

    pub fn name(&self) -> String {
        self.data.lock().name.clone()
    }

    pub fn set_id(&self, value: impl Into<String>) {
        let value = value.into();
        let (changed, callback) = {
            let mut data = self.data.lock();
            let changed = data.id != value;
            data.id = value.clone();
            (changed, data.callback.clone())
        };
        if changed {
            if let (Some(callback), Some(me)) = (callback, self.me.upgrade()) {
                callback.id_changed(&value, &me);
            }
        }
    }

    pub fn id(&self) -> String {
        self.data.lock().id.clone()
    }

    pub fn set_description(&self, value: impl Into<String>) {
        let value = value.into();
        let (changed, callback) = {
            let mut data = self.data.lock();
            let changed = data.description != value;
            data.description = value.clone();
            (changed, data.callback.clone())
        };
        if changed {
            if let (Some(callback), Some(me)) = (callback, self.me.upgrade()) {
                callback.description_changed(&value, &me);
            }
        }
    }

    pub fn description(&self) -> String {
        self.data.lock().description.clone()
    }

    /// Sets the job's priority. Stored for the embedder's benefit only;
    /// the core queue dispatches strictly FIFO.
    pub fn set_priority(&self, value: f64) {
        self.data.lock().priority = value;
    }

    pub fn priority(&self) -> f64 {
        self.data.lock().priority
    }

    /// Records progress and notifies observers. Progress is always
    /// notified, even when the value repeats.
    pub fn set_percent_complete(&self, value: f64) {
        let callback = {
            let mut data = self.data.lock();
            data.percent_complete = value;
            data.callback.clone()
        };
        if let (Some(callback), Some(me)) = (callback, self.me.upgrade()) {
            callback.percent_complete_changed(value, &me);
        }
    }

    pub fn percent_complete(&self) -> f64 {
        self.data.lock().percent_complete
    }

    /// Attaches the head of the notification chain.
    pub fn set_callback(&self, callback: Arc<dyn JobCallback>) {
        self.data.lock().callback = Some(callback);
    }

    /// The head of the notification chain, if any.
    pub fn callback(&self) -> Option<Arc<dyn JobCallback>> {
        self.data.lock().callback.clone()
    }
}
