//! Two-round barrier rendezvous across restartable worker threads.

use jobmill::{thread, Barrier, Thread, ThreadContext};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn two_rounds_of_rendezvous_complete() {
    let n_threads = 2;
    let barrier_start = Arc::new(Barrier::new(n_threads));
    // one extra party for the test thread
    let barrier_finished = Arc::new(Barrier::new(n_threads + 1));

    let workers: Vec<Thread> = (0..n_threads)
        .map(|_| {
            let start = Arc::clone(&barrier_start);
            let finished = Arc::clone(&barrier_finished);
            Thread::new(move |ctx: &ThreadContext| {
                start.block();
                for _ in 0..10 {
                    thread::sleep_millis(100);
                    ctx.interrupt_point()?;
                }
                finished.block();
                Ok(())
            })
        })
        .collect();

    let begun = Instant::now();

    for worker in &workers {
        worker.start();
    }
    barrier_finished.block();
    for worker in &workers {
        worker.wait_for_completion();
    }

    // rearm and run the same threads again
    barrier_finished.reset();
    barrier_start.reset();
    for worker in &workers {
        worker.start();
    }
    barrier_finished.block();
    for worker in &workers {
        worker.wait_for_completion();
    }

    // each round holds its workers for at least a second
    assert!(begun.elapsed() >= Duration::from_secs(2));
    for worker in &workers {
        assert!(!worker.is_running());
    }
}
