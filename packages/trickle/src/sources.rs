//! Publishers with no upstream: iterators, suppliers, constants and deferred construction.

use std::fmt;
use std::iter::Peekable;

use crate::{BoxSubscriber, Emitter, Error, Flux, Generator, Publisher, Step};

/// Publishes the items of a generator through an [`Emitter`].
pub(crate) struct GeneratorPublisher<G> {
    generator: G,
}

impl<G> GeneratorPublisher<G> {
    pub(crate) fn new(generator: G) -> Self {
        Self { generator }
    }
}

impl<T, G> Publisher<T> for GeneratorPublisher<G>
where
    T: 'static,
    G: Generator<T>,
{
    fn subscribe(self: Box<Self>, subscriber: BoxSubscriber<T>) {
        Emitter::start(self.generator, subscriber);
    }
}

impl<G> fmt::Debug for GeneratorPublisher<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorPublisher").finish_non_exhaustive()
    }
}

/// Emits the items of an iterator, completing as soon as it is exhausted.
///
/// Looking one item ahead lets the sequence complete right after the last item, without the
/// subscriber having to request more first. An empty iterator completes immediately.
pub(crate) struct IterGenerator<I>
where
    I: Iterator,
{
    items: Peekable<I>,
}

impl<I> IterGenerator<I>
where
    I: Iterator,
{
    pub(crate) fn new(items: I) -> Self {
        Self {
            items: items.peekable(),
        }
    }
}

impl<I> Generator<I::Item> for IterGenerator<I>
where
    I: Iterator + Send + 'static,
    I::Item: Send,
{
    fn step(&mut self) -> Step<I::Item> {
        match self.items.next() {
            Some(item) => Step::Next(item),
            None => Step::Complete,
        }
    }

    fn ended(&mut self, _outstanding: u64) -> Option<Result<(), Error>> {
        self.items.peek().is_none().then_some(Ok(()))
    }
}

/// Calls a supplier for every requested item. Never completes on its own.
pub(crate) struct SupplierGenerator<F> {
    supplier: F,
}

impl<F> SupplierGenerator<F> {
    pub(crate) fn new(supplier: F) -> Self {
        Self { supplier }
    }
}

impl<T, F> Generator<T> for SupplierGenerator<F>
where
    F: FnMut() -> T + Send + 'static,
{
    fn step(&mut self) -> Step<T> {
        Step::Next((self.supplier)())
    }
}

/// Terminates immediately with the stored outcome, without emitting any item.
pub(crate) struct TerminalGenerator {
    outcome: Option<Result<(), Error>>,
}

impl TerminalGenerator {
    pub(crate) fn completed() -> Self {
        Self {
            outcome: Some(Ok(())),
        }
    }

    pub(crate) fn failed(error: Error) -> Self {
        Self {
            outcome: Some(Err(error)),
        }
    }
}

impl<T> Generator<T> for TerminalGenerator {
    fn step(&mut self) -> Step<T> {
        match self.outcome.take() {
            Some(Err(error)) => Step::Fail(error),
            Some(Ok(())) | None => Step::Complete,
        }
    }

    fn ended(&mut self, _outstanding: u64) -> Option<Result<(), Error>> {
        self.outcome.take()
    }
}

/// Builds the real publisher only when somebody subscribes.
pub(crate) struct Defer<F> {
    factory: F,
}

impl<F> Defer<F> {
    pub(crate) fn new(factory: F) -> Self {
        Self { factory }
    }
}

impl<T, F> Publisher<T> for Defer<F>
where
    F: FnOnce() -> Flux<T> + Send,
{
    fn subscribe(self: Box<Self>, subscriber: BoxSubscriber<T>) {
        (self.factory)().attach(subscriber);
    }
}

impl<F> fmt::Debug for Defer<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Defer").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::TestSubscriber;

    #[test]
    fn iterator_completes_right_after_last_item() {
        let probe = TestSubscriber::with_initial_request(3);
        Flux::from_iterable(vec![10, 20, 30]).subscribe(probe.clone());

        assert_eq!(probe.items(), vec![10, 20, 30]);
        assert!(probe.is_completed());
    }

    #[test]
    fn empty_iterator_completes_without_demand() {
        let probe = TestSubscriber::<i32>::with_initial_request(0);
        Flux::from_iterable(Vec::new()).subscribe(probe.clone());

        assert!(probe.is_completed());
        assert_eq!(probe.signal_names(), vec!["onSubscribe", "onComplete"]);
    }

    #[test]
    fn supplier_is_called_once_per_requested_item() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = TestSubscriber::with_initial_request(4);

        Flux::generate({
            let calls = Arc::clone(&calls);
            move || calls.fetch_add(1, Ordering::Relaxed)
        })
        .subscribe(probe.clone());

        assert_eq!(probe.items(), vec![0, 1, 2, 3]);
        assert_eq!(calls.load(Ordering::Relaxed), 4);
        assert!(!probe.is_completed());

        probe.cancel();
    }

    #[test]
    fn error_source_fails_without_demand() {
        let probe = TestSubscriber::<i32>::with_initial_request(0);
        Flux::error(Error::msg("boom")).subscribe(probe.clone());

        assert!(probe.error().is_some());
        assert!(probe.items().is_empty());
    }

    #[test]
    fn defer_builds_publisher_per_subscribe() {
        let built = Arc::new(AtomicUsize::new(0));

        let flux = Flux::defer({
            let built = Arc::clone(&built);
            move || {
                built.fetch_add(1, Ordering::Relaxed);
                Flux::just([1, 2])
            }
        });

        assert_eq!(built.load(Ordering::Relaxed), 0);

        let probe = TestSubscriber::new();
        flux.subscribe(probe.clone());

        assert_eq!(built.load(Ordering::Relaxed), 1);
        assert_eq!(probe.items(), vec![1, 2]);
    }
}
