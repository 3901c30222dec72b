//! Pool management and lifecycle.

use std::any::type_name;
use std::fmt;
use std::mem;
use std::num::NonZero;
use std::panic;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle as ThreadJoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use new_zealand::nz;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::constants::DEFAULT_THREAD_NAME_PREFIX;
use crate::{IterationResult, Job, Scheduler, WorkerCore};

pub(crate) struct PoolInner {
    /// `None` once shutdown has started.
    sender: Mutex<Option<Sender<Job>>>,
    shutdown_flag: AtomicBool,
    worker_count: NonZero<usize>,
    worker_handles: Mutex<Vec<ThreadJoinHandle<()>>>,
}

impl fmt::Debug for PoolInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("worker_count", &self.worker_count)
            .field("shutdown", &self.shutdown_flag.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl PoolInner {
    fn spawn_workers(self: &Arc<Self>, jobs: &Receiver<Job>, thread_name_prefix: &str) {
        let mut new_handles = Vec::with_capacity(self.worker_count.get());

        for worker_index in 0..self.worker_count.get() {
            let inner_clone = Arc::clone(self);
            let jobs = jobs.clone();

            let handle = thread::Builder::new()
                .name(format!("{thread_name_prefix}-w{worker_index}"))
                .spawn(move || {
                    debug!(worker_index, "worker thread started");
                    worker_loop(&inner_clone, &jobs, worker_index);
                    debug!(worker_index, "worker thread exiting");
                })
                .expect("failed to spawn worker thread: thread spawning failure is not supported");

            new_handles.push(handle);
        }

        self.worker_handles.lock().extend(new_handles);
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.shutdown_flag.load(Ordering::Acquire)
    }

    /// Queues a job. Hands the job back if the pool no longer accepts work.
    pub(crate) fn submit(&self, job: Job) -> Result<(), Job> {
        let sender = self.sender.lock();

        match sender.as_ref() {
            Some(sender) => sender.send(job).map_err(|error| error.into_inner()),
            None => Err(job),
        }
    }

    pub(crate) fn join_all_workers(&self) {
        // Release ordering pairs with the Acquire in the worker iteration.
        self.shutdown_flag.store(true, Ordering::Release);

        // Closing the channel wakes every idle worker.
        drop(self.sender.lock().take());

        let handles = mem::take(&mut *self.worker_handles.lock());
        let current = thread::current().id();

        for handle in handles {
            // A pool dropped from one of its own jobs cannot wait for itself.
            if handle.thread().id() == current {
                continue;
            }

            if let Err(payload) = handle.join() {
                // Jobs run inside a panic trap and workers should never panic. If one does,
                // something is very wrong with the pool infrastructure. We propagate the panic
                // to ensure this critical failure is not silently ignored.
                panic::resume_unwind(payload);
            }
        }

        debug!(worker_count = self.worker_count.get(), "pool shut down");
    }
}

fn worker_loop(inner: &PoolInner, jobs: &Receiver<Job>, worker_index: usize) {
    let core = WorkerCore::new(jobs, &inner.shutdown_flag);

    loop {
        match core.run_one_iteration() {
            IterationResult::Executed => {
                trace!(worker_index, "executed job");
            }
            IterationResult::Panicked => {
                trace!(worker_index, "job panicked");
            }
            IterationResult::Shutdown | IterationResult::Disconnected => {
                break;
            }
        }
    }
}

/// A fixed set of worker threads that runs scheduled work.
///
/// A pool with several workers runs jobs concurrently, in any order. A pool with a single worker
/// ([`Pool::single()`]) runs them strictly one at a time in submission order.
///
/// Work is handed to the pool through a [`Scheduler`], typically via
/// [`Flux::subscribe_on()`][crate::Flux::subscribe_on].
///
/// # Lifetime
///
/// When the pool is dropped:
/// 1. All worker threads are signaled to shut down.
/// 2. The drop blocks until all currently-executing jobs complete.
/// 3. Any queued jobs that have not started are abandoned. A subscription abandoned this way
///    fails with [`Error::Abandoned`][crate::Error::Abandoned].
///
/// Schedulers outlive their pool but reject new work once it has been dropped.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
///
/// use trickle::{Flux, Pool, TestSubscriber};
///
/// let pool = Pool::builder().thread_name_prefix("numbers").build();
/// let probe = TestSubscriber::new();
///
/// Flux::range(1, 3)
///     .subscribe_on(pool.scheduler())
///     .subscribe(probe.clone());
///
/// assert!(probe.await_terminal(Duration::from_secs(10)));
/// assert_eq!(probe.items(), vec![1, 2, 3]);
/// ```
#[derive(Debug)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Creates a pool with one worker per available processor.
    ///
    /// Use [`Pool::builder()`] for custom configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a pool with one worker per available processor.
    #[must_use]
    pub fn parallel() -> Self {
        Self::new()
    }

    /// Creates a pool with a single worker, executing jobs strictly in submission order.
    #[must_use]
    pub fn single() -> Self {
        Self::builder().workers(nz!(1)).build()
    }

    /// Creates a builder for configuring the pool.
    #[must_use]
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Returns a scheduler that can be used to hand work to this pool.
    ///
    /// The scheduler can be cloned and shared across threads.
    #[must_use]
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(Arc::clone(&self.inner))
    }

    /// Number of worker threads in the pool.
    #[must_use]
    pub fn worker_count(&self) -> NonZero<usize> {
        self.inner.worker_count
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.inner.join_all_workers();
    }
}

/// Builder for configuring a [`Pool`].
#[derive(Debug)]
pub struct PoolBuilder {
    workers: Option<NonZero<usize>>,
    thread_name_prefix: String,
}

impl PoolBuilder {
    fn new() -> Self {
        Self {
            workers: None,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }

    /// Sets the number of worker threads.
    ///
    /// Default is the available parallelism of the machine.
    #[must_use]
    pub fn workers(mut self, count: NonZero<usize>) -> Self {
        self.workers = Some(count);
        self
    }

    /// Sets the prefix of worker thread names. Workers are named `{prefix}-w{index}`.
    ///
    /// Default is `trickle`.
    #[must_use]
    pub fn thread_name_prefix(mut self, prefix: &str) -> Self {
        prefix.clone_into(&mut self.thread_name_prefix);
        self
    }

    /// Builds the pool and starts its worker threads.
    #[must_use]
    pub fn build(self) -> Pool {
        let worker_count = self
            .workers
            .unwrap_or_else(|| thread::available_parallelism().unwrap_or(nz!(1)));

        let (sender, receiver) = channel::unbounded();

        let inner = Arc::new(PoolInner {
            sender: Mutex::new(Some(sender)),
            shutdown_flag: AtomicBool::new(false),
            worker_count,
            worker_handles: Mutex::new(Vec::new()),
        });

        inner.spawn_workers(&receiver, &self.thread_name_prefix);

        Pool { inner }
    }
}
