//! # jobmill - Job Execution Engine
//!
//! A small concurrency toolkit for dispatching many independent units of
//! work across a bounded pool of worker threads, with cooperative
//! interruption, pause/resume and lifecycle callbacks. It is meant to be
//! embedded inside a larger application (an image-processing pipeline,
//! for instance) rather than used as a framework.
//!
//! ## Architecture
//!
//! The pieces stack bottom-up:
//!
//! - **Barrier** and **Block**: a resettable N-way rendezvous and a
//!   manual-reset latch, the two signalling primitives everything else
//!   is built from
//! - **Thread**: a managed OS thread with cooperative cancellation and
//!   pause/resume via interrupt points
//! - **Job**: an observable unit of work with a bit-flag state machine
//!   and a callback chain
//! - **JobQueue**: a thread-safe FIFO that producers feed and consumers
//!   drain, parking on the latch while empty
//! - **QueueWorker** and **JobPool**: one thread bound to one queue, and
//!   many of them sharing it
//!
//! ## Example
//!
//! ```no_run
//! use jobmill::{thread, Job, JobPool};
//! use std::sync::Arc;
//!
//! let pool = JobPool::new(None, 4); // 4 worker threads
//! let queue = pool.job_queue();
//!
//! queue.add(
//!     Job::new(|_job: &Arc<Job>| {
//!         println!("Hello from a pooled job!");
//!     }),
//!     true,
//! );
//!
//! while pool.has_jobs_to_process() {
//!     thread::sleep_millis(10);
//! }
//! pool.cancel();
//! pool.wait_for_completion();
//! ```

pub mod barrier;
pub mod block;
pub mod job;
pub mod job_queue;
pub mod pool;
pub mod thread;
pub mod worker;

pub use barrier::Barrier;
pub use block::Block;
pub use job::{Job, JobCallback, JobState, JobWork};
pub use job_queue::{JobQueue, QueueCallback};
pub use pool::JobPool;
pub use thread::{Interrupted, Thread, ThreadContext, ThreadTask};
pub use worker::QueueWorker;
