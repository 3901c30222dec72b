//! Worker thread logic for executing jobs from the pool queue.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel::Receiver;
use tracing::error;

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum IterationResult {
    Executed,
    Panicked,
    Shutdown,

    /// Every sender is gone and the queue is empty.
    Disconnected,
}

pub(crate) struct WorkerCore<'a> {
    jobs: &'a Receiver<Job>,
    shutdown_flag: &'a AtomicBool,
}

impl<'a> WorkerCore<'a> {
    pub(crate) fn new(jobs: &'a Receiver<Job>, shutdown_flag: &'a AtomicBool) -> Self {
        Self {
            jobs,
            shutdown_flag,
        }
    }

    /// Waits for the next job and runs it, unless the pool is shutting down.
    pub(crate) fn run_one_iteration(&self) -> IterationResult {
        // Acquire ordering synchronizes with the Release in the pool shutdown, so a job
        // received after shutdown started is never executed.
        if self.shutdown_flag.load(Ordering::Acquire) {
            return IterationResult::Shutdown;
        }

        let Ok(job) = self.jobs.recv() else {
            return IterationResult::Disconnected;
        };

        if self.shutdown_flag.load(Ordering::Acquire) {
            // Abandoned. Dropping the job lets it report that to whoever waits on it.
            drop(job);
            return IterationResult::Shutdown;
        }

        match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(()) => IterationResult::Executed,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "<non-string panic payload>".to_string());

                error!(message, "job panicked; the panic has been logged and discarded");
                IterationResult::Panicked
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;

    use crossbeam::channel;

    use super::*;

    fn counting_job(counter: &Arc<AtomicU32>) -> Job {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        })
    }

    #[test]
    fn queued_job_executes() {
        let counter = Arc::new(AtomicU32::new(0));
        let (tx, rx) = channel::unbounded();
        let shutdown = AtomicBool::new(false);

        tx.send(counting_job(&counter)).unwrap();

        let core = WorkerCore::new(&rx, &shutdown);

        assert_eq!(core.run_one_iteration(), IterationResult::Executed);
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn closed_empty_queue_returns_disconnected() {
        let (tx, rx) = channel::unbounded::<Job>();
        let shutdown = AtomicBool::new(false);
        drop(tx);

        let core = WorkerCore::new(&rx, &shutdown);

        assert_eq!(core.run_one_iteration(), IterationResult::Disconnected);
    }

    #[test]
    fn shutdown_prevents_job_execution() {
        let counter = Arc::new(AtomicU32::new(0));
        let (tx, rx) = channel::unbounded();
        let shutdown = AtomicBool::new(true);

        tx.send(counting_job(&counter)).unwrap();

        let core = WorkerCore::new(&rx, &shutdown);

        assert_eq!(core.run_one_iteration(), IterationResult::Shutdown);
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn panicking_job_is_contained() {
        let counter = Arc::new(AtomicU32::new(0));
        let (tx, rx) = channel::unbounded::<Job>();
        let shutdown = AtomicBool::new(false);

        tx.send(Box::new(|| panic!("intentional panic"))).unwrap();
        tx.send(counting_job(&counter)).unwrap();

        let core = WorkerCore::new(&rx, &shutdown);

        assert_eq!(core.run_one_iteration(), IterationResult::Panicked);
        assert_eq!(core.run_one_iteration(), IterationResult::Executed);
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }
}
