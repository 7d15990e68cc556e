//! Manual-reset latch.
//!
//! A [`Block`] is a level-triggered gate: while `released` is false,
//! `block()` suspends the caller; once released, every call returns
//! without suspending until the latch is reset. The job queue embeds one
//! to park workers on an empty queue — level triggering means a producer
//! racing a consumer cannot lose the wakeup.
//!
//! # Example
//!
//! ```no_run
//! use jobmill::Block;
//! use std::sync::Arc;
//!
//! let gate = Arc::new(Block::new(false));
//! let waiter = Arc::clone(&gate);
//!
//! let handle = std::thread::spawn(move || {
//!     waiter.block();
//!     println!("released");
//! });
//!
//! std::thread::sleep(std::time::Duration::from_secs(2));
//! gate.release();
//! handle.join().unwrap();
//! ```

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// A manual-reset latch with an optional bounded wait.
pub struct Block {
    released: AtomicBool,
    /// Threads currently suspended in `block`.
    wait_count: AtomicUsize,
    lock: Mutex<()>,
    released_cond: Condvar,
    drained: Condvar,
}

impl Block {
    /// Creates a latch with the given initial release state.
    pub fn new(released: bool) -> Self {
        Block {
            released: AtomicBool::new(released),
            wait_count: AtomicUsize::new(0),
            lock: Mutex::new(()),
            released_cond: Condvar::new(),
            drained: Condvar::new(),
        }
    }

    /// Assigns the release state and wakes all waiters to re-test it.
    pub fn set(&self, released: bool) {
        {
            let _guard = self.lock.lock();
            self.released.store(released, Ordering::SeqCst);
        }
        self.released_cond.notify_all();
    }

    /// Suspends the caller until the latch is released. Returns
    /// immediately if it already is.
    pub fn block(&self) {
        let mut guard = self.lock.lock();
        if !self.released.load(Ordering::SeqCst) {
            self.wait_count.fetch_add(1, Ordering::SeqCst);
            while !self.released.load(Ordering::SeqCst) {
                self.released_cond.wait(&mut guard);
            }
            self.wait_count.fetch_sub(1, Ordering::SeqCst);
        }
        self.released_cond.notify_all();
        self.drained.notify_all();
    }

    /// Like [`block`](Self::block) but waits at most `timeout`. Returns
    /// `true` if the latch was released, `false` if the wait timed out.
    /// Timing out is not an error.
    pub fn block_timeout(&self, timeout: Duration) -> bool {
        let mut guard = self.lock.lock();
        if !self.released.load(Ordering::SeqCst) {
            let deadline = Instant::now() + timeout;
            self.wait_count.fetch_add(1, Ordering::SeqCst);
            while !self.released.load(Ordering::SeqCst) {
                if self.released_cond.wait_until(&mut guard, deadline).timed_out() {
                    break;
                }
            }
            self.wait_count.fetch_sub(1, Ordering::SeqCst);
        }
        let released = self.released.load(Ordering::SeqCst);
        self.released_cond.notify_all();
        self.drained.notify_all();
        released
    }

    /// Releases the latch, waking every suspended thread.
    pub fn release(&self) {
        let _guard = self.lock.lock();
        if !self.released.load(Ordering::SeqCst) {
            self.released.store(true, Ordering::SeqCst);
        }
        self.released_cond.notify_all();
    }

    /// Rearms the latch without releasing anybody. Only meaningful when
    /// no thread is suspended on it.
    pub fn reset(&self) {
        let _guard = self.lock.lock();
        self.released.store(false, Ordering::SeqCst);
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        self.release();
        let mut guard = self.lock.lock();
        while self.wait_count.load(Ordering::SeqCst) > 0 {
            self.drained.wait(&mut guard);
        }
    }
}
