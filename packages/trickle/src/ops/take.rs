use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    BoxSubscriber, EmptySubscription, Error, Flux, Publisher, Subscriber, Subscription,
    SubscriptionHandle, SubscriptionSlot,
};

/// Forwards the first `limit` items, then cancels upstream and completes.
///
/// Upstream never sees more cumulative demand than `limit`, so a timer source is not asked for
/// ticks that would be thrown away.
pub(crate) struct Take<T> {
    upstream: Flux<T>,
    limit: u64,
}

impl<T> Take<T> {
    pub(crate) fn new(upstream: Flux<T>, limit: u64) -> Self {
        Self { upstream, limit }
    }
}

impl<T> Publisher<T> for Take<T>
where
    T: Send + 'static,
{
    fn subscribe(self: Box<Self>, mut subscriber: BoxSubscriber<T>) {
        if self.limit == 0 {
            subscriber.on_subscribe(EmptySubscription::handle());
            subscriber.on_complete();
            return;
        }

        let shared = Arc::new(TakeShared {
            upstream: SubscriptionSlot::new(),
            limit: self.limit,
            forwarded: AtomicU64::new(0),
        });

        self.upstream.attach(Box::new(TakeSubscriber {
            downstream: subscriber,
            shared,
            remaining: self.limit,
        }));
    }
}

impl<T> fmt::Debug for Take<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Take")
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct TakeShared {
    upstream: SubscriptionSlot,
    limit: u64,

    /// Cumulative demand passed upstream so far, never above `limit`.
    forwarded: AtomicU64,
}

#[derive(Debug)]
struct TakeSubscription {
    shared: Arc<TakeShared>,
}

impl Subscription for TakeSubscription {
    fn request(&self, n: u64) {
        if n == 0 {
            self.shared.upstream.request(0);
            return;
        }

        let limit = self.shared.limit;
        let previous = self
            .shared
            .forwarded
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |forwarded| {
                (forwarded < limit).then(|| forwarded.saturating_add(n).min(limit))
            });

        if let Ok(previous) = previous {
            let allowed = n.min(limit.saturating_sub(previous));
            self.shared.upstream.request(allowed);
        }
    }

    fn cancel(&self) {
        self.shared.upstream.cancel();
    }
}

struct TakeSubscriber<T> {
    downstream: BoxSubscriber<T>,
    shared: Arc<TakeShared>,
    remaining: u64,
}

impl<T> Subscriber<T> for TakeSubscriber<T>
where
    T: Send,
{
    fn on_subscribe(&mut self, subscription: SubscriptionHandle) {
        self.shared.upstream.set(subscription);

        self.downstream.on_subscribe(Arc::new(TakeSubscription {
            shared: Arc::clone(&self.shared),
        }));
    }

    fn on_next(&mut self, item: T) {
        if self.remaining == 0 {
            return;
        }

        self.remaining = self.remaining.saturating_sub(1);
        self.downstream.on_next(item);

        if self.remaining == 0 {
            self.shared.upstream.cancel();
            self.downstream.on_complete();
        }
    }

    fn on_error(&mut self, error: Error) {
        if self.remaining > 0 {
            self.remaining = 0;
            self.downstream.on_error(error);
        }
    }

    fn on_complete(&mut self) {
        if self.remaining > 0 {
            self.remaining = 0;
            self.downstream.on_complete();
        }
    }
}

impl<T> fmt::Debug for TakeSubscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TakeSubscriber")
            .field("shared", &self.shared)
            .field("remaining", &self.remaining)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use crate::{Flux, TestSubscriber};

    #[test]
    fn take_completes_after_limit() {
        let probe = TestSubscriber::new();
        Flux::range(0, 100).take(3).subscribe(probe.clone());

        assert_eq!(probe.items(), vec![0, 1, 2]);
        assert!(probe.is_completed());
    }

    #[test]
    fn take_zero_completes_without_subscribing_upstream() {
        let subscribed = Arc::new(AtomicU64::new(0));
        let probe = TestSubscriber::<i64>::new();

        Flux::defer({
            let subscribed = Arc::clone(&subscribed);
            move || {
                subscribed.fetch_add(1, Ordering::Relaxed);
                Flux::range(0, 10)
            }
        })
        .take(0)
        .subscribe(probe.clone());

        assert!(probe.is_completed());
        assert_eq!(subscribed.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn take_caps_upstream_demand() {
        let supplied = Arc::new(AtomicU64::new(0));
        let probe = TestSubscriber::new();

        Flux::generate({
            let supplied = Arc::clone(&supplied);
            move || supplied.fetch_add(1, Ordering::Relaxed)
        })
        .take(5)
        .subscribe(probe.clone());

        assert_eq!(probe.items(), vec![0, 1, 2, 3, 4]);
        assert!(probe.is_completed());
        assert_eq!(supplied.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn take_shorter_source_completes_with_source() {
        let probe = TestSubscriber::new();
        Flux::just([1, 2]).take(5).subscribe(probe.clone());

        assert_eq!(probe.items(), vec![1, 2]);
        assert!(probe.is_completed());
    }

    #[test]
    fn partial_requests_add_up_to_limit() {
        let probe = TestSubscriber::with_initial_request(2);
        Flux::range(0, 100).take(3).subscribe(probe.clone());

        assert_eq!(probe.items(), vec![0, 1]);

        probe.request(10);
        assert_eq!(probe.items(), vec![0, 1, 2]);
        assert!(probe.is_completed());
    }
}
