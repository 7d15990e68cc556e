use jobmill::{thread, Barrier, Block, Job, JobCallback, JobPool, Thread, ThreadContext};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

struct PrintCallback;

impl JobCallback for PrintCallback {
    fn started(&self, job: &Arc<Job>) {
        println!("  started  {}", job.name());
    }
    fn finished(&self, job: &Arc<Job>) {
        println!("  finished {}", job.name());
    }
    fn canceled(&self, job: &Arc<Job>) {
        println!("  canceled {}", job.name());
    }
}

fn main() {
    env_logger::init();
    println!("jobmill - Job Execution Engine\n");

    // Example 1: two-round barrier rendezvous
    println!("Example 1: Barrier rendezvous, two rounds");
    let n_threads = 2;
    let barrier_start = Arc::new(Barrier::new(n_threads));
    // one more party for the main thread
    let barrier_finished = Arc::new(Barrier::new(n_threads + 1));

    let workers: Vec<Thread> = (0..n_threads)
        .map(|_| {
            let start = Arc::clone(&barrier_start);
            let finished = Arc::clone(&barrier_finished);
            Thread::new(move |ctx: &ThreadContext| {
                start.block();
                println!("  THREAD: {:?}", thread::current_thread_id());
                for _ in 0..10 {
                    thread::sleep_millis(10);
                    ctx.interrupt_point()?;
                }
                finished.block();
                Ok(())
            })
        })
        .collect();

    for worker in &workers {
        worker.start();
    }
    barrier_finished.block();
    for worker in &workers {
        worker.wait_for_completion();
    }

    println!("  redo:");
    barrier_finished.reset();
    barrier_start.reset();
    for worker in &workers {
        worker.start();
    }
    barrier_finished.block();
    for worker in &workers {
        worker.wait_for_completion();
    }
    println!("  both rounds complete\n");

    // Example 2: latch-gated worker
    println!("Example 2: latch-gated worker");
    let gate = Arc::new(Block::new(false));
    let waiter_gate = Arc::clone(&gate);
    let gated = Thread::new(move |_ctx: &ThreadContext| {
        waiter_gate.block();
        println!("  STARTING");
        Ok(())
    });
    gated.start();
    println!("  waiting 2 seconds before releasing the gate");
    thread::sleep_seconds(2);
    gate.release();
    gated.wait_for_completion();
    println!();

    // Example 3: pool of 5 draining 10 two-second jobs
    println!("Example 3: pool of 5 workers, 10 jobs");
    let pool = JobPool::new(None, 5);
    let queue = pool.job_queue();
    let completed = Arc::new(AtomicUsize::new(0));

    let started_at = Instant::now();
    for i in 0..10 {
        let completed = Arc::clone(&completed);
        let job = Job::new(move |_job: &Arc<Job>| {
            thread::sleep_seconds(2);
            completed.fetch_add(1, Ordering::SeqCst);
        });
        job.set_name(format!("job-{i}"));
        job.set_callback(Arc::new(PrintCallback));
        queue.add(job, true);
    }

    while pool.has_jobs_to_process() || completed.load(Ordering::SeqCst) < 10 {
        thread::sleep_millis(10);
    }
    println!(
        "  {} jobs completed in {:?}",
        completed.load(Ordering::SeqCst),
        started_at.elapsed()
    );

    println!("  canceling pool");
    pool.cancel();
    pool.wait_for_completion();
    println!("Done!");
}
