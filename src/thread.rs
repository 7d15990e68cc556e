//! Managed OS threads with cooperative cancellation and pause/resume.
//!
//! A [`Thread`] owns at most one OS thread at a time and drives a
//! [`ThreadTask`]. The task receives a [`ThreadContext`] and is expected
//! to call [`ThreadContext::interrupt_point`] wherever it can safely be
//! canceled or paused:
//!
//! ```no_run
//! use jobmill::thread::{self, Thread};
//!
//! let worker = Thread::new(|ctx: &jobmill::ThreadContext| {
//!     for _ in 0..10 {
//!         thread::sleep_millis(10);
//!         ctx.interrupt_point()?;
//!     }
//!     Ok(())
//! });
//!
//! worker.start();
//! worker.cancel();
//! worker.wait_for_completion();
//! ```
//!
//! Cancellation is cooperative: `cancel()` raises a flag, and the next
//! `interrupt_point()` returns [`Interrupted`], which the task body
//! propagates with `?` up to the spawn shim. When the flag is clear an
//! interrupt point instead enters the pause barrier, so every interrupt
//! point doubles as a pause point.

use crate::barrier::Barrier;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// The cancellation sentinel returned by an interrupt point once the
/// thread has been canceled. Task bodies propagate it with `?`; it is
/// caught by the spawn shim and treated as a normal exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("thread interrupted")]
pub struct Interrupted;

/// The body of a managed thread. Implemented by any
/// `Fn(&ThreadContext) -> Result<(), Interrupted>` closure; implement it
/// directly when the body needs its own state.
pub trait ThreadTask: Send + Sync + 'static {
    /// Runs the thread body. Call `ctx.interrupt_point()?` at safe
    /// points so cancellation and pausing can take effect.
    fn run(&self, ctx: &ThreadContext) -> Result<(), Interrupted>;
}

impl<F> ThreadTask for F
where
    F: Fn(&ThreadContext) -> Result<(), Interrupted> + Send + Sync + 'static,
{
    fn run(&self, ctx: &ThreadContext) -> Result<(), Interrupted> {
        self(ctx)
    }
}

/// Shared state between a [`Thread`] handle and its running body.
pub struct ThreadContext {
    running: AtomicBool,
    interrupt: AtomicBool,
    /// max_count 1 while running, 2 while paused.
    pause_barrier: Barrier,
    running_lock: Mutex<()>,
    running_cond: Condvar,
}

impl ThreadContext {
    fn new() -> Self {
        ThreadContext {
            running: AtomicBool::new(false),
            interrupt: AtomicBool::new(false),
            pause_barrier: Barrier::new(1),
            running_lock: Mutex::new(()),
            running_cond: Condvar::new(),
        }
    }

    /// Whether the thread body is currently executing.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Whether cancellation has been requested.
    pub fn is_interruptible(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    /// Cooperative cancellation and pause point. Returns
    /// `Err(Interrupted)` if the thread has been canceled; otherwise
    /// rendezvouses on the pause barrier (parking the caller while the
    /// thread is paused) and returns `Ok(())`.
    pub fn interrupt_point(&self) -> Result<(), Interrupted> {
        if self.is_interruptible() {
            return Err(Interrupted);
        }
        self.pause_barrier.block();
        Ok(())
    }

    fn set_interruptible(&self, flag: bool) {
        self.interrupt.store(flag, Ordering::Relaxed);
    }

    fn mark_stopped(&self) {
        let _guard = self.running_lock.lock();
        self.running.store(false, Ordering::Relaxed);
        self.running_cond.notify_all();
    }
}

/// A managed OS thread.
///
/// `start()` on an idle handle spawns a fresh OS thread; the same handle
/// can be restarted after the body exits. Dropping a `Thread` waits for
/// the body to finish and joins — it does **not** cancel, so a handle
/// whose task never exits must be canceled before it is dropped or the
/// drop will hang.
pub struct Thread {
    ctx: Arc<ThreadContext>,
    task: Arc<dyn ThreadTask>,
    name: Option<String>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Thread {
    /// Creates an idle thread handle for `task`.
    pub fn new<T: ThreadTask>(task: T) -> Self {
        Thread {
            ctx: Arc::new(ThreadContext::new()),
            task: Arc::new(task),
            name: None,
            handle: Mutex::new(None),
        }
    }

    /// Like [`new`](Self::new), with an OS-level thread name.
    pub fn with_name<T: ThreadTask>(task: T, name: impl Into<String>) -> Self {
        let mut thread = Thread::new(task);
        thread.name = Some(name.into());
        thread
    }

    /// Spawns the OS thread. A no-op if the body is already running or
    /// cancellation is pending (clear it with `set_cancel(false)` to
    /// restart a canceled handle).
    pub fn start(&self) {
        if self.ctx.is_interruptible() || self.ctx.is_running() {
            return;
        }
        self.ctx.running.store(true, Ordering::Relaxed);

        let mut handle = self.handle.lock();
        // a previous round may not have been joined yet
        if let Some(stale) = handle.take() {
            let _ = stale.join();
        }

        let ctx = Arc::clone(&self.ctx);
        let task = Arc::clone(&self.task);
        let mut builder = std::thread::Builder::new();
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        let spawned = builder
            .spawn(move || {
                if !ctx.is_interruptible() {
                    let _ = task.run(&ctx);
                }
                ctx.mark_stopped();
            })
            .expect("failed to spawn thread");
        *handle = Some(spawned);
    }

    /// Requests cancellation; the body exits at its next interrupt
    /// point. Equivalent to `set_cancel(true)`.
    pub fn cancel(&self) {
        self.set_cancel(true);
    }

    /// Raises or clears the cancellation flag. Raising it also resumes a
    /// paused thread so the cancel can be observed.
    pub fn set_cancel(&self, flag: bool) {
        self.ctx.set_interruptible(flag);
        if flag {
            self.resume();
        }
    }

    /// Parks the thread at its next interrupt point.
    pub fn pause(&self) {
        self.ctx.pause_barrier.reset_count(2);
    }

    /// Releases a paused thread.
    pub fn resume(&self) {
        self.ctx.pause_barrier.reset_count(1);
    }

    /// Whether the thread is parked on its pause barrier.
    pub fn is_paused(&self) -> bool {
        self.ctx.pause_barrier.blocked_count() > 0
    }

    /// Whether the thread body is currently executing.
    pub fn is_running(&self) -> bool {
        self.ctx.is_running()
    }

    /// Whether cancellation has been requested.
    pub fn is_interruptible(&self) -> bool {
        self.ctx.is_interruptible()
    }

    /// Suspends the caller until the body exits. Returns immediately if
    /// the thread was never started.
    pub fn wait_for_completion(&self) {
        if self.handle.lock().is_none() {
            return;
        }
        let mut guard = self.ctx.running_lock.lock();
        while self.ctx.is_running() {
            self.ctx.running_cond.wait(&mut guard);
        }
    }

    /// The shared context handed to the task body.
    pub fn context(&self) -> &Arc<ThreadContext> {
        &self.ctx
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        self.wait_for_completion();
        if let Some(handle) = self.handle.get_mut().take() {
            let _ = handle.join();
        }
    }
}

/// Suspends the current thread for `seconds` seconds.
pub fn sleep_seconds(seconds: u64) {
    std::thread::sleep(Duration::from_secs(seconds));
}

/// Suspends the current thread for `millis` milliseconds.
pub fn sleep_millis(millis: u64) {
    std::thread::sleep(Duration::from_millis(millis));
}

/// Suspends the current thread for `micros` microseconds.
pub fn sleep_micros(micros: u64) {
    std::thread::sleep(Duration::from_micros(micros));
}

/// Yields the current thread's timeslice.
pub fn yield_now() {
    std::thread::yield_now();
}

/// The current OS thread's identifier.
pub fn current_thread_id() -> std::thread::ThreadId {
    std::thread::current().id()
}

/// The number of hardware threads available.
pub fn hardware_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
