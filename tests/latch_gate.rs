//! A worker gated on a manual-reset latch passes only once released.

use jobmill::{thread, Block, Thread, ThreadContext};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn gated_worker_starts_only_after_release() {
    let gate = Arc::new(Block::new(false));
    let passed = Arc::new(AtomicBool::new(false));

    let worker_gate = Arc::clone(&gate);
    let worker_passed = Arc::clone(&passed);
    let worker = Thread::new(move |_ctx: &ThreadContext| {
        worker_gate.block();
        worker_passed.store(true, Ordering::SeqCst);
        Ok(())
    });

    let begun = Instant::now();
    worker.start();

    thread::sleep_seconds(2);
    assert!(!passed.load(Ordering::SeqCst), "gate leaked early");

    gate.release();
    worker.wait_for_completion();
    assert!(passed.load(Ordering::SeqCst));
    assert!(begun.elapsed() >= Duration::from_secs(2));
}
