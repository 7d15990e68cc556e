//! Resettable N-party rendezvous.
//!
//! A [`Barrier`] blocks arriving threads until `max_count` of them have
//! arrived, then releases them all. Unlike `std::sync::Barrier` it can be
//! reset (optionally to a new party count) while threads are suspended,
//! which is what the pause/resume machinery in [`crate::thread`] is built
//! on.
//!
//! # Example
//!
//! ```no_run
//! use jobmill::Barrier;
//! use std::sync::Arc;
//!
//! let barrier = Arc::new(Barrier::new(2));
//! let other = Arc::clone(&barrier);
//!
//! let handle = std::thread::spawn(move || {
//!     // released once both parties have arrived
//!     other.block();
//! });
//!
//! barrier.block();
//! handle.join().unwrap();
//! ```

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

struct BarrierState {
    max_count: usize,
    blocked_count: usize,
}

/// An N-party rendezvous point with reset support.
///
/// `block()` suspends callers until `max_count` parties have arrived.
/// `reset()` releases any suspended parties and waits for them to drain
/// before zeroing the arrival count, so a new round cannot race ahead of
/// an unfinished release. Reuse across rounds requires a `reset()` in
/// between; arrivals past `max_count` return immediately.
pub struct Barrier {
    state: Mutex<BarrierState>,
    /// Number of threads currently suspended on the rendezvous.
    wait_count: AtomicUsize,
    rendezvous: Condvar,
    drained: Condvar,
}

impl Barrier {
    /// Creates a barrier for `max_count` parties.
    pub fn new(max_count: usize) -> Self {
        Barrier {
            state: Mutex::new(BarrierState {
                max_count,
                blocked_count: 0,
            }),
            wait_count: AtomicUsize::new(0),
            rendezvous: Condvar::new(),
            drained: Condvar::new(),
        }
    }

    /// Arrives at the barrier, suspending until `max_count` parties have
    /// arrived or the barrier is reset.
    pub fn block(&self) {
        let mut state = self.state.lock();
        state.blocked_count += 1;
        if state.blocked_count < state.max_count {
            self.wait_count.fetch_add(1, Ordering::SeqCst);
            while state.blocked_count < state.max_count {
                self.rendezvous.wait(&mut state);
            }
            self.wait_count.fetch_sub(1, Ordering::SeqCst);
        } else {
            self.rendezvous.notify_all();
        }
        // every returning party signals the drain condition for reset()
        self.drained.notify_all();
    }

    /// Releases any suspended parties, waits for them to drain, then
    /// rearms the barrier for a new round.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        // force the rendezvous condition for any suspended threads
        state.blocked_count = state.max_count;
        if self.wait_count.load(Ordering::SeqCst) > 0 {
            self.rendezvous.notify_all();
            while self.wait_count.load(Ordering::SeqCst) > 0 {
                self.drained.wait(&mut state);
            }
        }
        state.blocked_count = 0;
        self.wait_count.store(0, Ordering::SeqCst);
    }

    /// `reset()` followed by a change of the party count.
    pub fn reset_count(&self, max_count: usize) {
        self.reset();
        self.state.lock().max_count = max_count;
    }

    /// The number of parties this barrier rendezvouses.
    pub fn max_count(&self) -> usize {
        self.state.lock().max_count
    }

    /// How many parties have arrived in the current round.
    pub fn blocked_count(&self) -> usize {
        self.state.lock().blocked_count
    }
}

impl Drop for Barrier {
    fn drop(&mut self) {
        // no thread may remain suspended on a dying barrier
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn single_party_barrier_never_blocks() {
        let barrier = Barrier::new(1);
        barrier.block();
        barrier.block();
        barrier.block();
    }

    #[test]
    fn rendezvous_releases_all_parties() {
        let barrier = Arc::new(Barrier::new(4));
        let released = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let barrier = Arc::clone(&barrier);
            let released = Arc::clone(&released);
            handles.push(thread::spawn(move || {
                barrier.block();
                released.fetch_add(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(released.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn stragglers_stay_suspended_until_last_arrival() {
        let barrier = Arc::new(Barrier::new(2));
        let released = Arc::new(AtomicUsize::new(0));

        let worker = {
            let barrier = Arc::clone(&barrier);
            let released = Arc::clone(&released);
            thread::spawn(move || {
                barrier.block();
                released.fetch_add(1, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(released.load(Ordering::SeqCst), 0);

        barrier.block();
        worker.join().unwrap();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reset_releases_suspended_parties() {
        let barrier = Arc::new(Barrier::new(3));
        let released = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let barrier = Arc::clone(&barrier);
            let released = Arc::clone(&released);
            handles.push(thread::spawn(move || {
                barrier.block();
                released.fetch_add(1, Ordering::SeqCst);
            }));
        }

        thread::sleep(Duration::from_millis(50));
        barrier.reset();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(released.load(Ordering::SeqCst), 2);
        assert_eq!(barrier.blocked_count(), 0);
    }

    #[test]
    fn reset_is_idempotent_when_idle() {
        let barrier = Barrier::new(2);
        barrier.reset();
        barrier.reset();
        assert_eq!(barrier.blocked_count(), 0);
        assert_eq!(barrier.max_count(), 2);
    }

    #[test]
    fn reset_count_changes_capacity() {
        let barrier = Barrier::new(2);
        barrier.reset_count(1);
        assert_eq!(barrier.max_count(), 1);
        // a single-party barrier releases immediately
        barrier.block();
    }
}
