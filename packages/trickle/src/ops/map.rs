use std::fmt;
use std::sync::Arc;

use crate::{BoxSubscriber, Error, Flux, Publisher, Result, Subscriber, SubscriptionHandle};

/// Transforms every item 1:1. Demand passes through unchanged.
///
/// The transform is fallible. An `Err` cancels upstream and becomes the downstream `on_error`.
pub(crate) struct Map<T, F> {
    upstream: Flux<T>,
    transform: F,
}

impl<T, F> Map<T, F> {
    pub(crate) fn new(upstream: Flux<T>, transform: F) -> Self {
        Self {
            upstream,
            transform,
        }
    }
}

impl<T, U, F> Publisher<U> for Map<T, F>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T) -> Result<U> + Send + 'static,
{
    fn subscribe(self: Box<Self>, subscriber: BoxSubscriber<U>) {
        let Self {
            upstream,
            transform,
        } = *self;

        upstream.attach(Box::new(MapSubscriber {
            downstream: subscriber,
            transform,
            upstream: None,
            done: false,
        }));
    }
}

impl<T, F> fmt::Debug for Map<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map").finish_non_exhaustive()
    }
}

struct MapSubscriber<U, F> {
    downstream: BoxSubscriber<U>,
    transform: F,
    upstream: Option<SubscriptionHandle>,
    done: bool,
}

impl<U, F> MapSubscriber<U, F> {
    fn fail(&mut self, error: Error) {
        self.done = true;

        if let Some(upstream) = self.upstream.take() {
            upstream.cancel();
        }

        self.downstream.on_error(error);
    }
}

impl<T, U, F> Subscriber<T> for MapSubscriber<U, F>
where
    F: FnMut(T) -> Result<U> + Send,
{
    fn on_subscribe(&mut self, subscription: SubscriptionHandle) {
        self.upstream = Some(Arc::clone(&subscription));
        self.downstream.on_subscribe(subscription);
    }

    fn on_next(&mut self, item: T) {
        if self.done {
            return;
        }

        match (self.transform)(item) {
            Ok(mapped) => self.downstream.on_next(mapped),
            Err(error) => self.fail(error),
        }
    }

    fn on_error(&mut self, error: Error) {
        if !self.done {
            self.done = true;
            self.downstream.on_error(error);
        }
    }

    fn on_complete(&mut self) {
        if !self.done {
            self.done = true;
            self.downstream.on_complete();
        }
    }
}

/// Drops items failing the predicate, re-requesting one item upstream for each.
pub(crate) struct Filter<T, P> {
    upstream: Flux<T>,
    predicate: P,
}

impl<T, P> Filter<T, P> {
    pub(crate) fn new(upstream: Flux<T>, predicate: P) -> Self {
        Self {
            upstream,
            predicate,
        }
    }
}

impl<T, P> Publisher<T> for Filter<T, P>
where
    T: Send + 'static,
    P: FnMut(&T) -> Result<bool> + Send + 'static,
{
    fn subscribe(self: Box<Self>, subscriber: BoxSubscriber<T>) {
        let Self {
            upstream,
            predicate,
        } = *self;

        upstream.attach(Box::new(FilterSubscriber {
            downstream: subscriber,
            predicate,
            upstream: None,
            done: false,
        }));
    }
}

impl<T, P> fmt::Debug for Filter<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter").finish_non_exhaustive()
    }
}

struct FilterSubscriber<T, P> {
    downstream: BoxSubscriber<T>,
    predicate: P,
    upstream: Option<SubscriptionHandle>,
    done: bool,
}

impl<T, P> Subscriber<T> for FilterSubscriber<T, P>
where
    T: Send,
    P: FnMut(&T) -> Result<bool> + Send,
{
    fn on_subscribe(&mut self, subscription: SubscriptionHandle) {
        self.upstream = Some(Arc::clone(&subscription));
        self.downstream.on_subscribe(subscription);
    }

    fn on_next(&mut self, item: T) {
        if self.done {
            return;
        }

        match (self.predicate)(&item) {
            Ok(true) => self.downstream.on_next(item),
            Ok(false) => {
                // The dropped item used up one unit of downstream demand upstream.
                if let Some(upstream) = &self.upstream {
                    upstream.request(1);
                }
            }
            Err(error) => {
                self.done = true;

                if let Some(upstream) = self.upstream.take() {
                    upstream.cancel();
                }

                self.downstream.on_error(error);
            }
        }
    }

    fn on_error(&mut self, error: Error) {
        if !self.done {
            self.done = true;
            self.downstream.on_error(error);
        }
    }

    fn on_complete(&mut self) {
        if !self.done {
            self.done = true;
            self.downstream.on_complete();
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use crate::{Error, Flux, TestSubscriber};

    #[test]
    fn map_transforms_each_item() {
        let probe = TestSubscriber::new();
        Flux::just([1, 2, 3]).map(|x| x * 10).subscribe(probe.clone());

        assert_eq!(probe.items(), vec![10, 20, 30]);
        assert!(probe.is_completed());
    }

    #[test]
    fn try_map_error_cancels_upstream() {
        let pulled = Arc::new(AtomicU64::new(0));
        let probe = TestSubscriber::new();

        Flux::range(1, 100)
            .do_on_next({
                let pulled = Arc::clone(&pulled);
                move |_| {
                    pulled.fetch_add(1, Ordering::Relaxed);
                }
            })
            .try_map(|x| {
                if x == 3 {
                    Err(Error::msg("Number 3 cannot be used"))
                } else {
                    Ok(x)
                }
            })
            .subscribe(probe.clone());

        assert_eq!(probe.items(), vec![1, 2]);
        assert!(probe.error().is_some_and(|e| e.is_upstream_failure()));
        assert_eq!(pulled.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn filter_yields_matching_items() {
        let probe = TestSubscriber::new();
        Flux::from_iterable(vec![10, 20, 30, 40])
            .filter(|x| x % 20 == 0)
            .subscribe(probe.clone());

        assert_eq!(probe.items(), vec![20, 40]);
        assert!(probe.is_completed());
    }

    #[test]
    fn filter_rerequests_for_rejected_items() {
        let probe = TestSubscriber::with_initial_request(2);
        Flux::range(1, 100)
            .filter(|x| x % 5 == 0)
            .subscribe(probe.clone());

        assert_eq!(probe.items(), vec![5, 10]);
        assert!(!probe.is_completed());

        probe.request(1);
        assert_eq!(probe.items(), vec![5, 10, 15]);
    }

    #[test]
    fn try_filter_error_terminates() {
        let probe = TestSubscriber::new();
        Flux::just([1, 2, 3])
            .try_filter(|x| {
                if *x == 2 {
                    Err(Error::msg("cannot judge 2"))
                } else {
                    Ok(true)
                }
            })
            .subscribe(probe.clone());

        assert_eq!(probe.items(), vec![1]);
        assert!(probe.error().is_some());
        assert!(!probe.is_completed());
    }
}
