//! Bridges from a reactive sequence to code that waits for its results.

use std::fmt;
use std::future::Future;
use std::num::NonZero;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crossbeam::channel::{self, Receiver, Sender};
use tracing::trace;

use crate::{Error, Flux, Result, Subscriber, SubscriptionHandle, SubscriptionSlot, UNBOUNDED};

type Settled<T> = Result<Option<T>>;

/// Remembers the most recent item and reports it once the sequence ends.
pub(crate) struct LastSubscriber<T> {
    last: Option<T>,
    sender: Option<oneshot::Sender<Settled<T>>>,
}

impl<T> LastSubscriber<T> {
    pub(crate) fn new() -> (Self, oneshot::Receiver<Settled<T>>) {
        let (sender, receiver) = oneshot::channel();

        (
            Self {
                last: None,
                sender: Some(sender),
            },
            receiver,
        )
    }

    fn settle(&mut self, outcome: Settled<T>) {
        if let Some(sender) = self.sender.take() {
            if sender.send(outcome).is_err() {
                trace!("outcome of a blocking subscription was not awaited");
            }
        }
    }
}

impl<T> Subscriber<T> for LastSubscriber<T>
where
    T: Send,
{
    fn on_subscribe(&mut self, subscription: SubscriptionHandle) {
        subscription.request(UNBOUNDED);
    }

    fn on_next(&mut self, item: T) {
        self.last = Some(item);
    }

    fn on_error(&mut self, error: Error) {
        self.last = None;
        self.settle(Err(error));
    }

    fn on_complete(&mut self) {
        let last = self.last.take();
        self.settle(Ok(last));
    }
}

impl<T> fmt::Debug for LastSubscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LastSubscriber")
            .field("has_last", &self.last.is_some())
            .field("settled", &self.sender.is_none())
            .finish()
    }
}

/// Blocks the current thread until the subscriber behind `receiver` settles.
///
/// A subscriber dropped without a terminal signal reports [`Error::Abandoned`].
fn wait<T>(receiver: oneshot::Receiver<Settled<T>>) -> Settled<T> {
    match receiver.recv() {
        Ok(outcome) => outcome,
        Err(_) => Err(Error::Abandoned),
    }
}

/// Subscribes to `flux` and blocks until it terminates, returning the last item.
pub(crate) fn block_last<T>(flux: Flux<T>) -> Settled<T>
where
    T: Send + 'static,
{
    let (subscriber, receiver) = LastSubscriber::new();
    flux.attach(Box::new(subscriber));
    wait(receiver)
}

/// Future returned by [`Mono::into_future()`][crate::Mono::into_future].
///
/// Resolves to the item of the [`Mono`][crate::Mono], to `None` if it completed empty, or to
/// the error that terminated it. The sequence is already running when the future is created;
/// dropping the future does not stop it.
pub struct MonoFuture<T> {
    receiver: oneshot::Receiver<Settled<T>>,
}

impl<T> MonoFuture<T>
where
    T: Send + 'static,
{
    pub(crate) fn new(flux: Flux<T>) -> Self {
        let (subscriber, receiver) = LastSubscriber::new();
        flux.attach(Box::new(subscriber));
        Self { receiver }
    }
}

impl<T> Future for MonoFuture<T> {
    type Output = Settled<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> fmt::Debug for MonoFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonoFuture").finish_non_exhaustive()
    }
}

/// Iterator over the items of a [`Flux`], blocking while waiting for the next one.
///
/// Created by [`Flux::into_blocking_iter()`]. The iterator keeps a bounded number of items
/// requested ahead of consumption and tops the demand up as items are taken out, so a fast
/// producer never gets more than that amount ahead of the consumer.
///
/// An error ends the iteration after it has been yielded as `Some(Err(_))`. Dropping the iterator
/// cancels the sequence.
pub struct BlockingIter<T> {
    items: Receiver<Result<T>>,
    upstream: Arc<SubscriptionSlot>,
    replenish_at: u64,
    consumed: u64,
    finished: bool,
}

impl<T> BlockingIter<T>
where
    T: Send + 'static,
{
    pub(crate) fn new(flux: Flux<T>, prefetch: NonZero<u64>) -> Self {
        let (sender, items) = channel::unbounded();
        let upstream = Arc::new(SubscriptionSlot::new());

        flux.attach(Box::new(ChannelSubscriber {
            sender: Some(sender),
            upstream: Arc::clone(&upstream),
            prefetch: prefetch.get(),
        }));

        let prefetch = prefetch.get();

        Self {
            items,
            upstream,
            // Top up once three quarters of the prefetched items have been taken.
            replenish_at: prefetch.saturating_sub(prefetch >> 2).max(1),
            consumed: 0,
            finished: false,
        }
    }
}

impl<T> Iterator for BlockingIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.items.recv() {
            Ok(Ok(item)) => {
                self.consumed = self.consumed.saturating_add(1);

                if self.consumed >= self.replenish_at {
                    self.upstream.request(self.consumed);
                    self.consumed = 0;
                }

                Some(Ok(item))
            }
            Ok(Err(error)) => {
                self.finished = true;
                Some(Err(error))
            }
            Err(_) => {
                self.finished = true;
                None
            }
        }
    }
}

impl<T> Drop for BlockingIter<T> {
    fn drop(&mut self) {
        self.upstream.cancel();
    }
}

impl<T> fmt::Debug for BlockingIter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingIter")
            .field("buffered", &self.items.len())
            .field("upstream", &self.upstream)
            .field("replenish_at", &self.replenish_at)
            .field("consumed", &self.consumed)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Feeds a [`BlockingIter`]. Completion is signalled by closing the channel.
struct ChannelSubscriber<T> {
    sender: Option<Sender<Result<T>>>,
    upstream: Arc<SubscriptionSlot>,
    prefetch: u64,
}

impl<T> ChannelSubscriber<T> {
    fn send(&mut self, item: Result<T>) {
        let Some(sender) = &self.sender else {
            return;
        };

        if sender.send(item).is_err() {
            // The iterator is gone.
            self.sender = None;
            self.upstream.cancel();
        }
    }
}

impl<T> Subscriber<T> for ChannelSubscriber<T>
where
    T: Send,
{
    fn on_subscribe(&mut self, subscription: SubscriptionHandle) {
        self.upstream.set(subscription);
        self.upstream.request(self.prefetch);
    }

    fn on_next(&mut self, item: T) {
        self.send(Ok(item));
    }

    fn on_error(&mut self, error: Error) {
        self.send(Err(error));
        self.sender = None;
    }

    fn on_complete(&mut self) {
        self.sender = None;
    }
}
