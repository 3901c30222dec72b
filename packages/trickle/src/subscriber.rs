use std::fmt;
use std::sync::Arc;

use tracing::error;

use crate::{Disposable, Error, SubscriptionHandle, SubscriptionSlot, UNBOUNDED};

/// A consumer of a reactive sequence.
///
/// A subscriber receives, in this order:
///
/// 1. Exactly one [`on_subscribe`][Self::on_subscribe] carrying the subscription through which it
///    requests items.
/// 2. Zero or more [`on_next`][Self::on_next], never more than it has requested in total.
/// 3. At most one terminal signal, either [`on_error`][Self::on_error] or
///    [`on_complete`][Self::on_complete]. A cancelled sequence simply stops without a terminal
///    signal.
///
/// Signals for one subscription are never delivered concurrently, although consecutive signals
/// may arrive on different threads when the sequence runs on a scheduler.
///
/// A subscriber may request demand incrementally from inside `on_next`, keeping memory use
/// bounded, or request [`UNBOUNDED`][crate::UNBOUNDED] up front in `on_subscribe` and trade
/// backpressure for convenience.
pub trait Subscriber<T>: Send {
    /// Receives the subscription before any other signal.
    fn on_subscribe(&mut self, subscription: SubscriptionHandle);

    /// Receives the next item.
    fn on_next(&mut self, item: T);

    /// Receives the error that terminated the sequence.
    fn on_error(&mut self, error: Error);

    /// Receives notification that the sequence finished successfully.
    fn on_complete(&mut self);
}

/// Owned [`Subscriber`] trait object, as passed through operator chains.
pub type BoxSubscriber<T> = Box<dyn Subscriber<T>>;

impl<T, S> Subscriber<T> for Box<S>
where
    S: Subscriber<T> + ?Sized,
{
    fn on_subscribe(&mut self, subscription: SubscriptionHandle) {
        (**self).on_subscribe(subscription);
    }

    fn on_next(&mut self, item: T) {
        (**self).on_next(item);
    }

    fn on_error(&mut self, error: Error) {
        (**self).on_error(error);
    }

    fn on_complete(&mut self) {
        (**self).on_complete();
    }
}

type NextFn<T> = Box<dyn FnMut(T) + Send>;
type ErrorFn = Box<dyn FnMut(Error) + Send>;
type CompleteFn = Box<dyn FnMut() + Send>;

/// Subscriber built from closures that requests unbounded demand as soon as it is subscribed.
///
/// This is the "no back-pressure" mode of consumption. Without an error callback an `OnError`
/// signal is treated as fatal.
pub(crate) struct LambdaSubscriber<T> {
    on_next: Option<NextFn<T>>,
    on_error: Option<ErrorFn>,
    on_complete: Option<CompleteFn>,
    slot: Arc<SubscriptionSlot>,
}

impl<T> LambdaSubscriber<T> {
    pub(crate) fn new(
        on_next: Option<NextFn<T>>,
        on_error: Option<ErrorFn>,
        on_complete: Option<CompleteFn>,
    ) -> Self {
        Self {
            on_next,
            on_error,
            on_complete,
            slot: Arc::new(SubscriptionSlot::new()),
        }
    }

    pub(crate) fn disposable(&self) -> Disposable {
        Disposable::new(Arc::clone(&self.slot))
    }
}

impl<T> Subscriber<T> for LambdaSubscriber<T>
where
    T: Send,
{
    fn on_subscribe(&mut self, subscription: SubscriptionHandle) {
        self.slot.set(Arc::clone(&subscription));

        if !self.slot.is_cancelled() {
            subscription.request(UNBOUNDED);
        }
    }

    fn on_next(&mut self, item: T) {
        if let Some(on_next) = &mut self.on_next {
            on_next(item);
        }
    }

    fn on_error(&mut self, error: Error) {
        match &mut self.on_error {
            Some(on_error) => on_error(error),
            None => {
                error!(%error, "sequence failed and no error callback was provided");
                panic!("error callback not implemented: {error}");
            }
        }
    }

    fn on_complete(&mut self) {
        if let Some(on_complete) = &mut self.on_complete {
            on_complete();
        }
    }
}

impl<T> fmt::Debug for LambdaSubscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LambdaSubscriber")
            .field("has_on_next", &self.on_next.is_some())
            .field("has_on_error", &self.on_error.is_some())
            .field("has_on_complete", &self.on_complete.is_some())
            .field("slot", &self.slot)
            .finish()
    }
}
