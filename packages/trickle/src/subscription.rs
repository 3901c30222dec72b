use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// The demand channel between one publisher and one subscriber.
///
/// A subscription is created by the publisher for every `subscribe()` call and handed to the
/// subscriber through [`Subscriber::on_subscribe`][crate::Subscriber::on_subscribe]. The
/// subscriber uses it to say how many more items it is prepared to receive and to stop the
/// sequence early.
///
/// Both methods may be called from any thread, including from inside `on_next` while the
/// publisher is in the middle of emitting.
pub trait Subscription: Send + Sync {
    /// Adds `n` to the outstanding demand.
    ///
    /// Demand accumulates and saturates at [`UNBOUNDED`][crate::UNBOUNDED], which switches the
    /// subscription into unbounded mode. Requesting zero items is a contract violation that
    /// terminates the sequence with [`Error::InvalidDemand`][crate::Error::InvalidDemand].
    fn request(&self, n: u64);

    /// Stops the sequence.
    ///
    /// No terminal signal is produced: the publisher stops emitting at its next emission
    /// attempt and releases its resources. Calling this more than once has no further effect.
    fn cancel(&self);
}

/// Shared handle to a [`Subscription`] trait object.
pub type SubscriptionHandle = Arc<dyn Subscription>;

/// A subscription that ignores everything, used for sequences that are already over by the
/// time the subscriber is attached.
#[derive(Debug, Default)]
pub(crate) struct EmptySubscription;

impl EmptySubscription {
    pub(crate) fn handle() -> SubscriptionHandle {
        Arc::new(Self)
    }
}

impl Subscription for EmptySubscription {
    fn request(&self, _n: u64) {}

    fn cancel(&self) {}
}

#[derive(Default)]
struct SlotState {
    cancelled: bool,
    subscription: Option<SubscriptionHandle>,
}

/// Holds a subscription that may arrive after someone has already decided to cancel it.
///
/// A subscription slot is filled from `on_subscribe`, which with scheduled publishers can run
/// on another thread well after the consumer got hold of its cancellation handle. Cancelling an
/// empty slot is remembered and applied as soon as the subscription arrives.
#[derive(Default)]
pub(crate) struct SubscriptionSlot {
    state: Mutex<SlotState>,
}

impl SubscriptionSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores the subscription, or cancels it right away if the slot was already cancelled.
    pub(crate) fn set(&self, subscription: SubscriptionHandle) {
        {
            let mut state = self.state.lock();

            if !state.cancelled {
                state.subscription = Some(subscription);
                return;
            }
        }

        subscription.cancel();
    }

    pub(crate) fn request(&self, n: u64) {
        let subscription = self.state.lock().subscription.clone();

        if let Some(subscription) = subscription {
            subscription.request(n);
        }
    }

    /// Cancels the stored subscription (if any) and every subscription stored in the future.
    pub(crate) fn cancel(&self) {
        let subscription = {
            let mut state = self.state.lock();
            state.cancelled = true;
            state.subscription.take()
        };

        if let Some(subscription) = subscription {
            subscription.cancel();
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }
}

impl fmt::Debug for SubscriptionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();

        f.debug_struct("SubscriptionSlot")
            .field("cancelled", &state.cancelled)
            .field("filled", &state.subscription.is_some())
            .finish()
    }
}

/// Handle returned by the lambda-style `subscribe` variants, used to stop the sequence.
///
/// Dropping the handle does not cancel anything; call [`Disposable::dispose()`] to do that.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
///
/// use trickle::Flux;
///
/// let disposable = Flux::interval(Duration::from_millis(10)).for_each(|_| {});
/// disposable.dispose();
/// assert!(disposable.is_disposed());
/// ```
#[derive(Clone, Debug)]
pub struct Disposable {
    slot: Arc<SubscriptionSlot>,
    disposed: Arc<AtomicBool>,
}

impl Disposable {
    pub(crate) fn new(slot: Arc<SubscriptionSlot>) -> Self {
        Self {
            slot,
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancels the underlying subscription. Subsequent calls do nothing.
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            self.slot.cancel();
        }
    }

    /// Whether [`Disposable::dispose()`] has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}
