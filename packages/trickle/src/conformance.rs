//! Detection of signal contract violations at the edge between the engine and user code.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::{
    BoxSubscriber, EmptySubscription, Error, Subscriber, Subscription, SubscriptionHandle,
    SubscriptionSlot, UNBOUNDED, Violation,
};

/// Where a subscription is in its life.
///
/// ```text
/// Unsubscribed → Subscribed → Emitting ⇄ AwaitingDemand → Terminated
/// ```
///
/// `Terminated` is absorbing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Lifecycle {
    /// `on_subscribe` has not been received yet.
    Unsubscribed,

    /// Subscribed but nothing requested so far.
    Subscribed,

    /// There is outstanding demand, so items may arrive.
    Emitting,

    /// All requested items have been received; the publisher is suspended.
    AwaitingDemand,

    /// The sequence is over.
    Terminated(Termination),
}

/// How a sequence ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Termination {
    /// `on_complete` was received.
    Completed,

    /// `on_error` was received.
    Failed,

    /// The subscriber cancelled.
    Cancelled,
}

/// What to do with an incoming signal.
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum Verdict {
    Deliver,

    /// Late signals after a cancellation are expected and silently dropped.
    Discard,

    Reject(Violation),
}

/// The lifecycle state machine plus the outstanding demand as seen by the subscriber.
#[derive(Debug)]
pub(crate) struct Tracker {
    lifecycle: Lifecycle,
    outstanding: u64,
}

impl Tracker {
    pub(crate) fn new() -> Self {
        Self {
            lifecycle: Lifecycle::Unsubscribed,
            outstanding: 0,
        }
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub(crate) fn is_terminated(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Terminated(_))
    }

    pub(crate) fn on_subscribe(&mut self) -> Verdict {
        match self.lifecycle {
            Lifecycle::Unsubscribed => {
                self.lifecycle = Lifecycle::Subscribed;
                Verdict::Deliver
            }
            _ => Verdict::Reject(Violation::DuplicateSubscribe),
        }
    }

    pub(crate) fn on_request(&mut self, n: u64) {
        if n == 0 {
            return;
        }

        if matches!(
            self.lifecycle,
            Lifecycle::Subscribed | Lifecycle::Emitting | Lifecycle::AwaitingDemand
        ) {
            self.outstanding = self.outstanding.saturating_add(n);
            self.lifecycle = Lifecycle::Emitting;
        }
    }

    pub(crate) fn on_next(&mut self) -> Verdict {
        match self.lifecycle {
            Lifecycle::Unsubscribed => Verdict::Reject(Violation::SignalBeforeSubscribe),
            Lifecycle::Terminated(Termination::Cancelled) => Verdict::Discard,
            Lifecycle::Terminated(_) => Verdict::Reject(Violation::SignalAfterTerminal),
            Lifecycle::Subscribed | Lifecycle::Emitting | Lifecycle::AwaitingDemand => {
                if self.outstanding == 0 {
                    return Verdict::Reject(Violation::DemandExceeded);
                }

                if self.outstanding != UNBOUNDED {
                    self.outstanding = self.outstanding.saturating_sub(1);
                }

                self.lifecycle = if self.outstanding == 0 {
                    Lifecycle::AwaitingDemand
                } else {
                    Lifecycle::Emitting
                };

                Verdict::Deliver
            }
        }
    }

    pub(crate) fn on_terminal(&mut self, termination: Termination) -> Verdict {
        match self.lifecycle {
            Lifecycle::Unsubscribed => Verdict::Reject(Violation::SignalBeforeSubscribe),
            Lifecycle::Terminated(Termination::Cancelled) => Verdict::Discard,
            Lifecycle::Terminated(_) => Verdict::Reject(Violation::SignalAfterTerminal),
            Lifecycle::Subscribed | Lifecycle::Emitting | Lifecycle::AwaitingDemand => {
                self.lifecycle = Lifecycle::Terminated(termination);
                Verdict::Deliver
            }
        }
    }

    pub(crate) fn on_cancel(&mut self) {
        if !self.is_terminated() {
            self.lifecycle = Lifecycle::Terminated(Termination::Cancelled);
        }
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct GuardShared {
    tracker: Mutex<Tracker>,
    upstream: SubscriptionSlot,
}

/// Subscription handed to the guarded subscriber. Keeps the tracker's view of demand current.
#[derive(Debug)]
struct GuardSubscription {
    shared: Arc<GuardShared>,
}

impl Subscription for GuardSubscription {
    fn request(&self, n: u64) {
        self.shared.tracker.lock().on_request(n);

        // Zero is forwarded as well, the source is the one that reports it.
        self.shared.upstream.request(n);
    }

    fn cancel(&self) {
        self.shared.tracker.lock().on_cancel();
        self.shared.upstream.cancel();
    }
}

/// Wraps a user subscriber and fails fast on any signal the contract does not allow.
///
/// A violation while the sequence is live cancels upstream and turns into
/// `on_error(ProtocolViolation)`. A violation after the sequence is over can no longer be
/// signalled and is only logged.
pub(crate) struct Guarded<T> {
    inner: BoxSubscriber<T>,
    shared: Arc<GuardShared>,
}

impl<T> Guarded<T> {
    pub(crate) fn new(inner: BoxSubscriber<T>) -> Self {
        Self {
            inner,
            shared: Arc::new(GuardShared {
                tracker: Mutex::new(Tracker::new()),
                upstream: SubscriptionSlot::new(),
            }),
        }
    }

    fn reject(&mut self, violation: Violation) {
        let was_subscribed = {
            let mut tracker = self.shared.tracker.lock();

            if tracker.is_terminated() {
                drop(tracker);
                warn!(%violation, "dropping signal received after the sequence terminated");
                return;
            }

            let was_subscribed = tracker.lifecycle() != Lifecycle::Unsubscribed;

            // The tracker only accepts on_subscribe from Unsubscribed, so go through it.
            if !was_subscribed {
                tracker.on_subscribe();
            }

            tracker.on_terminal(Termination::Failed);
            was_subscribed
        };

        self.shared.upstream.cancel();

        if !was_subscribed {
            self.inner.on_subscribe(EmptySubscription::handle());
        }

        self.inner.on_error(Error::ProtocolViolation(violation));
    }
}

impl<T> Subscriber<T> for Guarded<T>
where
    T: Send,
{
    fn on_subscribe(&mut self, subscription: SubscriptionHandle) {
        let verdict = self.shared.tracker.lock().on_subscribe();

        match verdict {
            Verdict::Deliver => {
                self.shared.upstream.set(subscription);

                let handle: SubscriptionHandle = Arc::new(GuardSubscription {
                    shared: Arc::clone(&self.shared),
                });
                self.inner.on_subscribe(handle);
            }
            Verdict::Discard => subscription.cancel(),
            Verdict::Reject(violation) => {
                // Rule: a second subscription is cancelled, never used.
                subscription.cancel();
                self.reject(violation);
            }
        }
    }

    fn on_next(&mut self, item: T) {
        let verdict = self.shared.tracker.lock().on_next();

        match verdict {
            Verdict::Deliver => self.inner.on_next(item),
            Verdict::Discard => {}
            Verdict::Reject(violation) => self.reject(violation),
        }
    }

    fn on_error(&mut self, error: Error) {
        let verdict = self.shared.tracker.lock().on_terminal(Termination::Failed);

        match verdict {
            Verdict::Deliver => self.inner.on_error(error),
            Verdict::Discard => {}
            Verdict::Reject(violation) => self.reject(violation),
        }
    }

    fn on_complete(&mut self) {
        let verdict = self
            .shared
            .tracker
            .lock()
            .on_terminal(Termination::Completed);

        match verdict {
            Verdict::Deliver => self.inner.on_complete(),
            Verdict::Discard => {}
            Verdict::Reject(violation) => self.reject(violation),
        }
    }
}

impl<T> fmt::Debug for Guarded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guarded")
            .field("shared", &self.shared)
            .finish_non_exhaustive()
    }
}
