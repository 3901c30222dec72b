//! Merging of inner sequences produced per upstream item.
//!
//! Up to `max_concurrency` inner sequences are subscribed at any time; upstream is asked for
//! that many items up front and for one more each time an inner sequence completes. Every
//! inner sequence is prefetched a fixed number of items and replenished one by one as its
//! items are delivered downstream, so the merge queue stays bounded.
//!
//! All items, from whichever thread they arrive on, go through one queue drained by a
//! [`Drain`]. That keeps `on_next` calls strictly sequential even when inner sequences run on
//! different schedulers.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::marker::PhantomData;
use std::num::NonZero;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::constants::DEFAULT_INNER_PREFETCH;
use crate::{
    BoxSubscriber, Demand, Drain, Error, Flux, Publisher, Subscriber, Subscription,
    SubscriptionHandle, SubscriptionSlot,
};

pub(crate) struct FlatMap<T, U, F> {
    upstream: Flux<T>,
    mapper: F,
    max_concurrency: NonZero<usize>,
    _inner: PhantomData<fn() -> U>,
}

impl<T, U, F> FlatMap<T, U, F> {
    pub(crate) fn new(upstream: Flux<T>, mapper: F, max_concurrency: NonZero<usize>) -> Self {
        Self {
            upstream,
            mapper,
            max_concurrency,
            _inner: PhantomData,
        }
    }
}

impl<T, U, F> Publisher<U> for FlatMap<T, U, F>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T) -> Flux<U> + Send + 'static,
{
    fn subscribe(self: Box<Self>, mut subscriber: BoxSubscriber<U>) {
        let Self {
            upstream,
            mapper,
            max_concurrency,
            ..
        } = *self;

        let merge = Arc::new(Merge {
            demand: Demand::new(),
            drain: Drain::held(),
            cancelled: AtomicBool::new(false),
            invalid: AtomicBool::new(false),
            upstream: SubscriptionSlot::new(),
            state: Mutex::new(MergeState {
                queue: VecDeque::new(),
                inners: HashMap::new(),
                upstream_done: false,
                terminated: false,
                error: None,
            }),
            downstream: Mutex::new(None),
        });

        subscriber.on_subscribe(Arc::clone(&merge) as SubscriptionHandle);
        *merge.downstream.lock() = Some(subscriber);
        merge.drain.run(|| merge.pass());

        if merge.cancelled.load(Ordering::Acquire) {
            return;
        }

        upstream.attach(Box::new(OuterSubscriber {
            merge,
            mapper,
            max_concurrency,
            next_id: 0,
        }));
    }
}

impl<T, U, F> fmt::Debug for FlatMap<T, U, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlatMap")
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

struct MergeState<U> {
    /// Items waiting for downstream demand, tagged with the inner sequence they came from.
    queue: VecDeque<(u64, U)>,

    /// Live inner sequences. An inner sequence is removed when it completes.
    inners: HashMap<u64, Arc<SubscriptionSlot>>,

    upstream_done: bool,

    /// Set once sources have been cancelled. No inner sequence may start after that.
    terminated: bool,

    error: Option<Error>,
}

struct Merge<U> {
    demand: Demand,
    drain: Drain,
    cancelled: AtomicBool,
    invalid: AtomicBool,
    upstream: SubscriptionSlot,
    state: Mutex<MergeState<U>>,

    // Only ever locked by the current holder of the drain.
    downstream: Mutex<Option<BoxSubscriber<U>>>,
}

impl<U> Merge<U>
where
    U: Send + 'static,
{
    fn signal(&self) {
        self.drain.signal(|| self.pass());
    }

    fn fail(&self, error: Error) {
        self.state.lock().error.get_or_insert(error);
        self.signal();
    }

    /// Cancels upstream and every live inner sequence and drops queued items.
    fn cancel_sources(&self) {
        let inners: Vec<_> = {
            let mut state = self.state.lock();
            state.terminated = true;
            state.queue.clear();
            state.inners.drain().map(|(_, slot)| slot).collect()
        };

        self.upstream.cancel();

        for inner in inners {
            inner.cancel();
        }
    }

    fn pass(&self) {
        let mut downstream = self.downstream.lock();

        loop {
            if downstream.is_none() {
                return;
            }

            if self.cancelled.load(Ordering::Acquire) {
                *downstream = None;
                self.cancel_sources();
                return;
            }

            let failure = if self.invalid.load(Ordering::Acquire) {
                Some(Error::InvalidDemand { requested: 0 })
            } else {
                self.state.lock().error.take()
            };

            if let Some(error) = failure {
                self.cancel_sources();

                if let Some(mut subscriber) = downstream.take() {
                    subscriber.on_error(error);
                }
                return;
            }

            let mut state = self.state.lock();

            if self.demand.current() > 0 {
                if let Some((id, item)) = state.queue.pop_front() {
                    let source = state.inners.get(&id).map(Arc::clone);
                    drop(state);

                    self.demand.produced(1);

                    if let Some(subscriber) = downstream.as_mut() {
                        subscriber.on_next(item);
                    }

                    if let Some(source) = source {
                        source.request(1);
                    }

                    continue;
                }
            }

            let finished = state.upstream_done && state.inners.is_empty() && state.queue.is_empty();
            drop(state);

            if finished {
                if let Some(mut subscriber) = downstream.take() {
                    subscriber.on_complete();
                }
            }

            return;
        }
    }
}

impl<U> Subscription for Merge<U>
where
    U: Send + 'static,
{
    fn request(&self, n: u64) {
        if n == 0 {
            self.invalid.store(true, Ordering::Release);
        } else {
            self.demand.add(n);
        }

        self.signal();
    }

    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.signal();
        }
    }
}

impl<U> fmt::Debug for Merge<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Merge")
            .field("demand", &self.demand)
            .field("cancelled", &self.cancelled)
            .field("upstream", &self.upstream)
            .finish_non_exhaustive()
    }
}

/// Subscribes to upstream and starts one inner sequence per item.
struct OuterSubscriber<U, F> {
    merge: Arc<Merge<U>>,
    mapper: F,
    max_concurrency: NonZero<usize>,
    next_id: u64,
}

impl<T, U, F> Subscriber<T> for OuterSubscriber<U, F>
where
    U: Send + 'static,
    F: FnMut(T) -> Flux<U> + Send,
{
    fn on_subscribe(&mut self, subscription: SubscriptionHandle) {
        self.merge.upstream.set(subscription);

        let initial = u64::try_from(self.max_concurrency.get()).unwrap_or(u64::MAX);
        self.merge.upstream.request(initial);
    }

    fn on_next(&mut self, item: T) {
        if self.merge.cancelled.load(Ordering::Acquire) {
            return;
        }

        let inner = (self.mapper)(item);

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        let slot = Arc::new(SubscriptionSlot::new());

        {
            let mut state = self.merge.state.lock();

            // The mapper may have been running while the merge failed on another thread.
            if state.terminated {
                return;
            }

            state.inners.insert(id, Arc::clone(&slot));
        }

        inner.attach(Box::new(InnerSubscriber {
            merge: Arc::clone(&self.merge),
            id,
            slot,
        }));
    }

    fn on_error(&mut self, error: Error) {
        self.merge.fail(error);
    }

    fn on_complete(&mut self) {
        self.merge.state.lock().upstream_done = true;
        self.merge.signal();
    }
}

struct InnerSubscriber<U> {
    merge: Arc<Merge<U>>,
    id: u64,
    slot: Arc<SubscriptionSlot>,
}

impl<U> Subscriber<U> for InnerSubscriber<U>
where
    U: Send + 'static,
{
    fn on_subscribe(&mut self, subscription: SubscriptionHandle) {
        self.slot.set(subscription);
        self.slot.request(DEFAULT_INNER_PREFETCH);
    }

    fn on_next(&mut self, item: U) {
        self.merge.state.lock().queue.push_back((self.id, item));
        self.merge.signal();
    }

    fn on_error(&mut self, error: Error) {
        self.merge.fail(error);
    }

    fn on_complete(&mut self) {
        let (removed, upstream_done) = {
            let mut state = self.merge.state.lock();
            (state.inners.remove(&self.id).is_some(), state.upstream_done)
        };

        // A finished inner sequence frees a slot for the next upstream item.
        if removed && !upstream_done {
            self.merge.upstream.request(1);
        }

        self.merge.signal();
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread;
    use std::time::Duration;

    use new_zealand::nz;
    use testing::with_watchdog;

    use crate::{Error, Flux, Pool, TestSubscriber};

    #[test]
    fn merges_inner_sequences() {
        let probe = TestSubscriber::new();
        Flux::just([1, 2, 3])
            .flat_map(|x| Flux::just([x, x * 10]))
            .subscribe(probe.clone());

        assert_eq!(probe.items(), vec![1, 10, 2, 20, 3, 30]);
        assert!(probe.is_completed());
    }

    #[test]
    fn respects_downstream_demand() {
        let probe = TestSubscriber::with_initial_request(3);
        Flux::range(0, 10)
            .flat_map(|x| Flux::range(x * 100, 5))
            .subscribe(probe.clone());

        assert_eq!(probe.items(), vec![0, 1, 2]);

        probe.request(4);
        assert_eq!(probe.item_count(), 7);
        assert!(!probe.is_completed());
    }

    #[test]
    fn inner_error_terminates_and_cancels() {
        let probe = TestSubscriber::new();
        Flux::just([1, 2, 3])
            .flat_map(|x| {
                if x == 2 {
                    Flux::error(Error::msg("inner failed"))
                } else {
                    Flux::just([x])
                }
            })
            .subscribe(probe.clone());

        assert_eq!(probe.items(), vec![1]);
        assert!(probe.error().is_some());
        assert!(!probe.is_completed());
    }

    #[test]
    fn upstream_items_limited_by_concurrency() {
        let pulled = Arc::new(AtomicU64::new(0));
        let probe = TestSubscriber::new();

        Flux::range(0, 100)
            .do_on_next({
                let pulled = Arc::clone(&pulled);
                move |_| {
                    pulled.fetch_add(1, Ordering::Relaxed);
                }
            })
            .flat_map_with(|_| Flux::interval(Duration::from_secs(3600)), nz!(4))
            .subscribe(probe.clone());

        assert_eq!(pulled.load(Ordering::Relaxed), 4);
        probe.cancel();
    }

    #[test]
    fn empty_upstream_completes() {
        let probe = TestSubscriber::<i32>::new();
        Flux::<i32>::empty()
            .flat_map(|x| Flux::just([x]))
            .subscribe(probe.clone());

        assert!(probe.is_completed());
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn inner_mapped_during_failure_is_never_started() {
        with_watchdog(|| {
            let pool = Pool::single();
            let ticks = Arc::new(AtomicU64::new(0));
            let probe = TestSubscriber::<u64>::new();

            Flux::just([1, 2])
                .flat_map({
                    let scheduler = pool.scheduler();
                    let ticks = Arc::clone(&ticks);
                    let probe = probe.clone();

                    move |x| {
                        if x == 1 {
                            return Flux::error(Error::msg("inner failed"))
                                .subscribe_on(scheduler.clone());
                        }

                        // The failure is delivered on the pool while this item is being mapped.
                        assert!(probe.await_terminal(Duration::from_secs(5)));

                        let ticks = Arc::clone(&ticks);
                        Flux::interval(Duration::from_millis(1)).do_on_next(move |_| {
                            ticks.fetch_add(1, Ordering::Relaxed);
                        })
                    }
                })
                .subscribe(probe.clone());

            assert!(probe.error().is_some());

            thread::sleep(Duration::from_millis(50));
            assert_eq!(ticks.load(Ordering::Relaxed), 0);
        });
    }
}
