//! Operators that reduce a sequence to at most one item.

use std::fmt;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    BoxSubscriber, Emitter, Error, Flux, Generator, Publisher, Step, Subscriber,
    SubscriptionHandle, SubscriptionSlot, UNBOUNDED,
};

#[derive(Debug)]
enum Outcome<T> {
    Unresolved,
    Value(T),
    Empty,
    Failed(Error),
    Delivered,
}

/// The single result of a reduction, produced by the upstream side and emitted downstream
/// once the downstream subscriber has asked for it.
struct Promise<T> {
    outcome: Mutex<Outcome<T>>,
    upstream: SubscriptionSlot,
}

struct PromiseGenerator<T> {
    promise: Arc<Promise<T>>,
}

impl<T> Generator<T> for PromiseGenerator<T>
where
    T: Send + 'static,
{
    fn step(&mut self) -> Step<T> {
        let mut outcome = self.promise.outcome.lock();

        match mem::replace(&mut *outcome, Outcome::Delivered) {
            Outcome::Value(value) => Step::Next(value),
            Outcome::Unresolved => {
                *outcome = Outcome::Unresolved;
                Step::Pending
            }
            Outcome::Failed(error) => Step::Fail(error),
            Outcome::Empty | Outcome::Delivered => Step::Complete,
        }
    }

    fn ended(&mut self, _outstanding: u64) -> Option<Result<(), Error>> {
        let mut outcome = self.promise.outcome.lock();

        match mem::replace(&mut *outcome, Outcome::Delivered) {
            Outcome::Empty | Outcome::Delivered => Some(Ok(())),
            Outcome::Failed(error) => Some(Err(error)),
            pending @ (Outcome::Unresolved | Outcome::Value(_)) => {
                *outcome = pending;
                None
            }
        }
    }
}

impl<T> Drop for PromiseGenerator<T> {
    fn drop(&mut self) {
        // Downstream is gone (cancelled or terminated), upstream has nobody to produce for.
        self.promise.upstream.cancel();
    }
}

/// Upstream-side handle that resolves the promise and wakes the downstream emitter.
struct Resolver<T>
where
    T: Send + 'static,
{
    promise: Arc<Promise<T>>,
    emitter: Arc<Emitter<T, PromiseGenerator<T>>>,
}

impl<T> Resolver<T>
where
    T: Send + 'static,
{
    fn start(downstream: BoxSubscriber<T>) -> Self {
        let promise = Arc::new(Promise {
            outcome: Mutex::new(Outcome::Unresolved),
            upstream: SubscriptionSlot::new(),
        });

        let emitter = Emitter::start(
            PromiseGenerator {
                promise: Arc::clone(&promise),
            },
            downstream,
        );

        Self { promise, emitter }
    }

    fn subscribed(&self, subscription: SubscriptionHandle, request: u64) {
        self.promise.upstream.set(subscription);
        self.promise.upstream.request(request);
    }

    fn resolve(&self, resolution: Outcome<T>) {
        {
            let mut outcome = self.promise.outcome.lock();

            if !matches!(*outcome, Outcome::Unresolved) {
                return;
            }

            *outcome = resolution;
        }

        self.emitter.wake();
    }

    fn cancel_upstream(&self) {
        self.promise.upstream.cancel();
    }
}

/// Collects every item into a `Vec`, emitted when upstream completes.
pub(crate) struct CollectList<T> {
    upstream: Flux<T>,
}

impl<T> CollectList<T> {
    pub(crate) fn new(upstream: Flux<T>) -> Self {
        Self { upstream }
    }
}

impl<T> Publisher<Vec<T>> for CollectList<T>
where
    T: Send + 'static,
{
    fn subscribe(self: Box<Self>, subscriber: BoxSubscriber<Vec<T>>) {
        self.upstream.attach(Box::new(CollectSubscriber {
            resolver: Resolver::start(subscriber),
            items: Vec::new(),
        }));
    }
}

impl<T> fmt::Debug for CollectList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectList").finish_non_exhaustive()
    }
}

struct CollectSubscriber<T>
where
    T: Send + 'static,
{
    resolver: Resolver<Vec<T>>,
    items: Vec<T>,
}

impl<T> Subscriber<T> for CollectSubscriber<T>
where
    T: Send + 'static,
{
    fn on_subscribe(&mut self, subscription: SubscriptionHandle) {
        self.resolver.subscribed(subscription, UNBOUNDED);
    }

    fn on_next(&mut self, item: T) {
        self.items.push(item);
    }

    fn on_error(&mut self, error: Error) {
        self.items.clear();
        self.resolver.resolve(Outcome::Failed(error));
    }

    fn on_complete(&mut self) {
        let items = mem::take(&mut self.items);
        self.resolver.resolve(Outcome::Value(items));
    }
}

/// Emits the first item and cancels the rest, or completes empty.
pub(crate) struct First<T> {
    upstream: Flux<T>,
}

impl<T> First<T> {
    pub(crate) fn new(upstream: Flux<T>) -> Self {
        Self { upstream }
    }
}

impl<T> Publisher<T> for First<T>
where
    T: Send + 'static,
{
    fn subscribe(self: Box<Self>, subscriber: BoxSubscriber<T>) {
        self.upstream.attach(Box::new(FirstSubscriber {
            resolver: Resolver::start(subscriber),
            done: false,
        }));
    }
}

impl<T> fmt::Debug for First<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("First").finish_non_exhaustive()
    }
}

struct FirstSubscriber<T>
where
    T: Send + 'static,
{
    resolver: Resolver<T>,
    done: bool,
}

impl<T> Subscriber<T> for FirstSubscriber<T>
where
    T: Send + 'static,
{
    fn on_subscribe(&mut self, subscription: SubscriptionHandle) {
        self.resolver.subscribed(subscription, 1);
    }

    fn on_next(&mut self, item: T) {
        if !self.done {
            self.done = true;
            self.resolver.cancel_upstream();
            self.resolver.resolve(Outcome::Value(item));
        }
    }

    fn on_error(&mut self, error: Error) {
        if !self.done {
            self.done = true;
            self.resolver.resolve(Outcome::Failed(error));
        }
    }

    fn on_complete(&mut self) {
        if !self.done {
            self.done = true;
            self.resolver.resolve(Outcome::Empty);
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use crate::{Error, Flux, Mono, TestSubscriber};

    #[test]
    fn collect_list_waits_for_demand() {
        let probe = TestSubscriber::with_initial_request(0);
        Flux::just([3, 1, 2]).collect_list().subscribe(probe.clone());

        assert!(probe.items().is_empty());
        assert!(!probe.is_completed());

        probe.request(1);
        assert_eq!(probe.items(), vec![vec![3, 1, 2]]);
        assert!(probe.is_completed());
    }

    #[test]
    fn collect_list_of_empty_is_empty_vec() {
        let probe = TestSubscriber::new();
        Flux::<i32>::empty().collect_list().subscribe(probe.clone());

        assert_eq!(probe.items(), vec![Vec::<i32>::new()]);
    }

    #[test]
    fn collect_list_error_needs_no_demand() {
        let probe = TestSubscriber::<Vec<i32>>::with_initial_request(0);
        Flux::error(Error::msg("nope")).collect_list().subscribe(probe.clone());

        assert!(probe.error().is_some());
    }

    #[test]
    fn first_item_cancels_the_rest() {
        let probe = TestSubscriber::new();
        Mono::from_flux(Flux::generate(|| 5)).subscribe(probe.clone());

        assert_eq!(probe.items(), vec![5]);
        assert!(probe.is_completed());
    }

    #[test]
    fn first_of_empty_completes_empty() {
        let probe = TestSubscriber::<i32>::new();
        Mono::from_flux(Flux::empty()).subscribe(probe.clone());

        assert!(probe.items().is_empty());
        assert!(probe.is_completed());
    }
}
