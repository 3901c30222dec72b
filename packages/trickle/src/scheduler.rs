//! Scheduler for handing work to the worker pool.

use std::sync::Arc;

use tracing::trace;

use crate::{Error, PoolInner};

/// A handle for running work on a [`Pool`][crate::Pool].
///
/// Schedulers are passed explicitly to the operators that relocate work, such as
/// [`Flux::subscribe_on()`][crate::Flux::subscribe_on]. There is no implicit global scheduler:
/// without one, everything runs on the thread that calls `subscribe()` or `request()`.
///
/// # Cloning
///
/// Schedulers are cheaply cloneable and can be shared across threads. All clones
/// reference the same underlying pool.
///
/// # Example
///
/// ```rust
/// use std::sync::mpsc;
///
/// use trickle::Pool;
///
/// let pool = Pool::single();
/// let scheduler = pool.scheduler();
///
/// let (tx, rx) = mpsc::channel();
/// scheduler.spawn(move || tx.send(42).unwrap()).unwrap();
///
/// assert_eq!(rx.recv().unwrap(), 42);
/// ```
#[derive(Clone, Debug)]
pub struct Scheduler {
    inner: Arc<PoolInner>,
}

impl Scheduler {
    pub(crate) fn new(inner: Arc<PoolInner>) -> Self {
        Self { inner }
    }

    /// Queues a task for execution on one of the pool's workers.
    ///
    /// The task's result is discarded. If the task panics, the panic is caught and logged via
    /// `tracing::error!` but is not propagated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] if the pool has been shut down. The task is dropped
    /// without running.
    pub fn spawn<F>(&self, task: F) -> Result<(), Error>
    where
        F: FnOnce() + Send + 'static,
    {
        match self.inner.submit(Box::new(task)) {
            Ok(()) => {
                trace!("spawned job");
                Ok(())
            }
            Err(job) => {
                drop(job);
                Err(Error::Rejected)
            }
        }
    }

    /// Whether the pool behind this scheduler has been shut down.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.is_shut_down()
    }
}
