use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::{Error, Lifecycle, Subscriber, SubscriptionHandle, Termination, Tracker, UNBOUNDED};

struct ProbeState<T> {
    tracker: Tracker,
    subscription: Option<SubscriptionHandle>,
    items: Vec<T>,
    error: Option<Error>,
    completed: bool,
    signals: Vec<&'static str>,
}

struct Probe<T> {
    state: Mutex<ProbeState<T>>,
    changed: Condvar,
    initial_request: u64,
}

/// A subscriber that records everything it receives, for verifying sequences in tests.
///
/// The subscriber is a cheap handle: clone it, pass one clone to `subscribe()` and inspect
/// the recorded signals through the other. Demand is under the test's control, starting with
/// the amount given to [`TestSubscriber::with_initial_request()`] (or unbounded for
/// [`TestSubscriber::new()`]) and growing with each [`TestSubscriber::request()`].
///
/// # Example
///
/// ```rust
/// use trickle::{Flux, TestSubscriber};
///
/// let probe = TestSubscriber::with_initial_request(2);
/// Flux::range(1, 5).subscribe(probe.clone());
/// assert_eq!(probe.items(), vec![1, 2]);
///
/// probe.request(10);
/// assert_eq!(probe.items(), vec![1, 2, 3, 4, 5]);
/// assert!(probe.is_completed());
/// ```
pub struct TestSubscriber<T> {
    probe: Arc<Probe<T>>,
}

impl<T> TestSubscriber<T> {
    /// Creates a subscriber that requests unbounded demand as soon as it is subscribed.
    #[must_use]
    pub fn new() -> Self {
        Self::with_initial_request(UNBOUNDED)
    }

    /// Creates a subscriber that requests `n` items when subscribed. Zero requests nothing.
    #[must_use]
    pub fn with_initial_request(n: u64) -> Self {
        Self {
            probe: Arc::new(Probe {
                state: Mutex::new(ProbeState {
                    tracker: Tracker::new(),
                    subscription: None,
                    items: Vec::new(),
                    error: None,
                    completed: false,
                    signals: Vec::new(),
                }),
                changed: Condvar::new(),
                initial_request: n,
            }),
        }
    }

    /// Requests `n` more items through the recorded subscription.
    ///
    /// # Panics
    ///
    /// Panics if the subscriber has not been subscribed yet.
    pub fn request(&self, n: u64) {
        let subscription = {
            let mut state = self.probe.state.lock();
            state.tracker.on_request(n);
            state
                .subscription
                .clone()
                .expect("request() called on a TestSubscriber that was never subscribed")
        };

        subscription.request(n);
    }

    /// Cancels the recorded subscription, if there is one.
    pub fn cancel(&self) {
        let subscription = {
            let mut state = self.probe.state.lock();
            state.tracker.on_cancel();
            state.subscription.clone()
        };

        if let Some(subscription) = subscription {
            subscription.cancel();
        }

        self.probe.changed.notify_all();
    }

    /// Number of items received so far.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.probe.state.lock().items.len()
    }

    /// The error that terminated the sequence, if any.
    #[must_use]
    pub fn error(&self) -> Option<Error> {
        self.probe.state.lock().error.clone()
    }

    /// Whether `on_complete` has been received.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.probe.state.lock().completed
    }

    /// Whether the sequence is over, by completion, error or cancellation.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        matches!(self.state(), Lifecycle::Terminated(_))
    }

    /// The lifecycle state as observed by this subscriber.
    #[must_use]
    pub fn state(&self) -> Lifecycle {
        self.probe.state.lock().tracker.lifecycle()
    }

    /// Names of all signals received so far, in order (e.g. `["onSubscribe", "onNext"]`).
    #[must_use]
    pub fn signal_names(&self) -> Vec<&'static str> {
        self.probe.state.lock().signals.clone()
    }

    /// Blocks until the sequence completes or fails, or the timeout elapses.
    ///
    /// Returns whether a terminal signal was received.
    #[must_use]
    pub fn await_terminal(&self, timeout: Duration) -> bool {
        self.wait_until(timeout, |state| {
            state.completed || state.error.is_some()
        })
    }

    /// Blocks until at least `count` items have arrived, or the sequence terminates, or the
    /// timeout elapses.
    ///
    /// Returns whether `count` items were received.
    #[must_use]
    pub fn await_items(&self, count: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |state| {
            state.items.len() >= count || state.completed || state.error.is_some()
        });

        self.item_count() >= count
    }

    fn wait_until(&self, timeout: Duration, done: impl Fn(&ProbeState<T>) -> bool) -> bool {
        let deadline = Instant::now()
            .checked_add(timeout)
            .expect("timeout too large to represent as a deadline");

        let mut state = self.probe.state.lock();

        loop {
            if done(&state) {
                return true;
            }

            if self
                .probe
                .changed
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return done(&state);
            }
        }
    }

    fn record(&self, name: &'static str, update: impl FnOnce(&mut MutexGuard<'_, ProbeState<T>>)) {
        {
            let mut state = self.probe.state.lock();
            state.signals.push(name);
            update(&mut state);
        }

        self.probe.changed.notify_all();
    }
}

impl<T> TestSubscriber<T>
where
    T: Clone,
{
    /// A copy of the items received so far.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.probe.state.lock().items.clone()
    }
}

impl<T> Clone for TestSubscriber<T> {
    fn clone(&self) -> Self {
        Self {
            probe: Arc::clone(&self.probe),
        }
    }
}

impl<T> Default for TestSubscriber<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Subscriber<T> for TestSubscriber<T>
where
    T: Send,
{
    fn on_subscribe(&mut self, subscription: SubscriptionHandle) {
        self.record("onSubscribe", |state| {
            state.tracker.on_subscribe();
            state.subscription = Some(Arc::clone(&subscription));
        });

        let initial = self.probe.initial_request;
        if initial > 0 {
            self.probe.state.lock().tracker.on_request(initial);
            subscription.request(initial);
        }
    }

    fn on_next(&mut self, item: T) {
        self.record("onNext", |state| {
            state.tracker.on_next();
            state.items.push(item);
        });
    }

    fn on_error(&mut self, error: Error) {
        self.record("onError", |state| {
            state.tracker.on_terminal(Termination::Failed);
            state.error = Some(error);
        });
    }

    fn on_complete(&mut self) {
        self.record("onComplete", |state| {
            state.tracker.on_terminal(Termination::Completed);
            state.completed = true;
        });
    }
}

impl<T> fmt::Debug for TestSubscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.probe.state.lock();

        f.debug_struct("TestSubscriber")
            .field("lifecycle", &state.tracker.lifecycle())
            .field("items", &state.items.len())
            .field("error", &state.error)
            .field("completed", &state.completed)
            .finish_non_exhaustive()
    }
}
