//! Thread pool for asynchronous background I/O operations.

use std::sync::{Arc, OnceLock};

/// A fixed-size thread pool dedicated to background I/O.
///
/// One instance is shared process-wide; producers submit range-fill jobs and
/// the consumer side never touches the pool directly.
pub struct IoPool {
    thread_pool: rayon::ThreadPool,
}

impl IoPool {
    /// Number of threads allocated to the I/O thread pool.
    // TODO: refine NUM_THREADS, possibly make it machine-dependent.
    const NUM_THREADS: usize = 16;

    /// Returns the global shared instance, lazily initialized on first call.
    pub fn get() -> Arc<IoPool> {
        static POOL: OnceLock<Arc<IoPool>> = OnceLock::new();
        POOL.get_or_init(IoPool::start).clone()
    }

    /// Provides access to the underlying thread pool.
    pub fn thread_pool(&self) -> &rayon::ThreadPool {
        &self.thread_pool
    }

    /// Submits a job, preserving FIFO order relative to other submissions.
    pub fn spawn(&self, job: impl FnOnce() + Send + 'static) {
        self.thread_pool.spawn_fifo(job);
    }

    fn start() -> Arc<IoPool> {
        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(Self::NUM_THREADS)
            .thread_name(|i| format!("rcscan_io_thread_{i}"))
            .build()
            .expect("thread pool");
        Arc::new(IoPool { thread_pool })
    }
}
