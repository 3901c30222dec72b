use std::fmt;

use tracing::debug;

use crate::{BoxSubscriber, EmptySubscription, Error, Flux, Publisher, Scheduler};

/// Performs the upstream `subscribe()` on a scheduler instead of the calling thread.
///
/// Emission that happens synchronously as part of subscribing (a finite iterator with unbounded
/// demand, for example) therefore runs on the scheduler too. Later `request()` calls run on
/// whichever thread makes them.
pub(crate) struct SubscribeOn<T> {
    upstream: Flux<T>,
    scheduler: Scheduler,
}

impl<T> SubscribeOn<T> {
    pub(crate) fn new(upstream: Flux<T>, scheduler: Scheduler) -> Self {
        Self {
            upstream,
            scheduler,
        }
    }
}

impl<T> Publisher<T> for SubscribeOn<T>
where
    T: Send + 'static,
{
    fn subscribe(self: Box<Self>, subscriber: BoxSubscriber<T>) {
        let Self {
            upstream,
            scheduler,
        } = *self;

        let job = PendingSubscribe {
            parts: Some((upstream, subscriber)),
        };

        if scheduler.is_shut_down() {
            job.fail(Error::Rejected);
            return;
        }

        if scheduler.spawn(move || job.run()).is_err() {
            // The job has been dropped, which already reported the failure downstream.
            debug!("scheduler shut down before the subscription could be queued");
        }
    }
}

impl<T> fmt::Debug for SubscribeOn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscribeOn")
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

/// A subscription waiting in a scheduler queue.
///
/// If the job is dropped without running, for example because the pool shut down with the job
/// still queued, the subscriber is told with [`Error::Abandoned`] so nobody waits forever.
struct PendingSubscribe<T> {
    parts: Option<(Flux<T>, BoxSubscriber<T>)>,
}

impl<T> PendingSubscribe<T>
where
    T: Send + 'static,
{
    fn run(mut self) {
        if let Some((upstream, subscriber)) = self.parts.take() {
            upstream.attach(subscriber);
        }
    }

    fn fail(mut self, error: Error) {
        if let Some((_, subscriber)) = self.parts.take() {
            reject(subscriber, error);
        }
    }
}

impl<T> Drop for PendingSubscribe<T> {
    fn drop(&mut self) {
        if let Some((_, subscriber)) = self.parts.take() {
            reject(subscriber, Error::Abandoned);
        }
    }
}

fn reject<T>(mut subscriber: BoxSubscriber<T>, error: Error) {
    subscriber.on_subscribe(EmptySubscription::handle());
    subscriber.on_error(error);
}
