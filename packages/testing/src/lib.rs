#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for tests, examples and benchmarks of the trickle packages.

use std::env;
use std::panic;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

/// Runs a test with a timeout to prevent infinite hangs.
///
/// Reactive pipelines that lose a demand signal do not fail, they stall. This wraps a test
/// closure so that a stalled pipeline turns into a test failure instead of a hung test run.
///
/// The timeout is 10 seconds under normal conditions and 60 seconds under
/// Miri, where thread synchronization primitives are significantly slower.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the watchdog
/// is disabled and the test function is executed directly. This allows mutation
/// testing to properly detect hanging mutations.
///
/// # Panics
///
/// Panics if the test exceeds the timeout (when not in mutation testing mode), or with the
/// test's own panic if it fails.
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// let sum = with_watchdog(|| (1..=4).sum::<i32>());
/// assert_eq!(sum, 10);
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let (tx, rx) = mpsc::channel();

    let test_handle = thread::Builder::new()
        .name("watchdog-test".to_string())
        .spawn(move || {
            let result = test_fn();
            // If this fails, the receiver has timed out already.
            drop(tx.send(result));
        })
        .expect("failed to spawn watchdog test thread: thread spawning failure is not supported");

    let timeout = if cfg!(miri) {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(10)
    };

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            test_handle.join().expect("Test thread should not panic");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("Test exceeded {timeout:?} timeout, the pipeline has probably stalled");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_handle.join() {
            Ok(()) => panic!("Test thread disconnected unexpectedly"),
            Err(e) => panic::resume_unwind(e),
        },
    }
}

/// Polls `condition` every millisecond until it holds or `timeout` elapses.
///
/// Returns whether the condition held. Meant for observing effects that happen on pool or timer
/// threads, where there is no signal to wait on.
#[must_use]
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now()
        .checked_add(timeout)
        .expect("timeout too large to represent as a deadline");

    loop {
        if condition() {
            return true;
        }

        if Instant::now() >= deadline {
            return condition();
        }

        thread::sleep(Duration::from_millis(1));
    }
}

/// Installs a `tracing` subscriber that prints to stdout, filtered by `RUST_LOG` (default
/// `info`). Calling it again is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Only the first call in a process can install the global subscriber.
    drop(
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .try_init(),
    );
}

/// A thread-safe list that callbacks running on any thread can append to.
///
/// # Example
///
/// ```rust
/// use testing::Collected;
///
/// let collected = Collected::new();
/// let mut sink = collected.sink();
///
/// sink(1);
/// sink(2);
///
/// assert_eq!(collected.snapshot(), vec![1, 2]);
/// ```
#[derive(Debug)]
pub struct Collected<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T> Collected<T> {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Appends an item.
    pub fn push(&self, item: T) {
        self.items.lock().push(item);
    }

    /// Returns a closure that appends its argument, suitable as an `on_next` callback.
    #[must_use]
    pub fn sink(&self) -> impl FnMut(T) + Send + 'static
    where
        T: Send + 'static,
    {
        let items = Arc::clone(&self.items);
        move |item| items.lock().push(item)
    }

    /// Number of items appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether nothing has been appended yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<T> Collected<T>
where
    T: Clone,
{
    /// A copy of the items appended so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.items.lock().clone()
    }
}

impl<T> Clone for Collected<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> Default for Collected<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn watchdog_returns_correct_value() {
        let result = with_watchdog(|| "hello world");
        assert_eq!(result, "hello world");
    }

    #[test]
    #[should_panic(expected = "from inside")]
    fn watchdog_forwards_panic() {
        with_watchdog(|| panic!("from inside"));
    }

    #[test]
    fn wait_until_sees_background_progress() {
        let counter = Arc::new(AtomicUsize::new(0));

        let worker = thread::spawn({
            let counter = Arc::clone(&counter);
            move || {
                for _ in 0..5 {
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            }
        });

        assert!(wait_until(Duration::from_secs(5), || {
            counter.load(Ordering::Relaxed) == 5
        }));

        worker.join().unwrap();
    }

    #[test]
    fn wait_until_gives_up() {
        assert!(!wait_until(Duration::from_millis(5), || false));
    }

    #[test]
    fn collected_is_shared_between_clones() {
        let collected = Collected::new();
        let clone = collected.clone();

        let mut sink = clone.sink();
        sink("a");
        collected.push("b");

        assert_eq!(clone.snapshot(), vec!["a", "b"]);
        assert_eq!(collected.len(), 2);
    }
}
