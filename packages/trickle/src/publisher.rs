use crate::BoxSubscriber;

/// A source of zero or more items, terminated by completion or an error.
///
/// A publisher is consumed by subscribing to it: every `subscribe()` call builds one independent
/// chain of operator nodes with its own subscription, so nothing is shared between subscribers.
///
/// Implementations must call [`Subscriber::on_subscribe`][crate::Subscriber::on_subscribe]
/// synchronously from `subscribe()` before any other signal, and must not emit more items than
/// the subscriber has requested.
pub trait Publisher<T>: Send {
    /// Attaches the subscriber and starts the sequence.
    fn subscribe(self: Box<Self>, subscriber: BoxSubscriber<T>);
}

/// Owned [`Publisher`] trait object.
pub type BoxPublisher<T> = Box<dyn Publisher<T>>;
