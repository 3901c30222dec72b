use std::collections::HashSet;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::num::NonZero;
use std::time::Duration;

use crate::constants::{DEFAULT_BLOCKING_PREFETCH, DEFAULT_MAX_CONCURRENCY};
use crate::{
    BlockingIter, BoxPublisher, BoxSubscriber, CollectList, Defer, Disposable, Error, Filter,
    FlatMap, GeneratorPublisher, Guarded, Hook, Interval, IterGenerator, LambdaSubscriber, Log,
    Map, Mono, Peek, Publisher, Result, Scheduler, Subscriber, SubscribeOn, SupplierGenerator,
    SwitchIfEmpty, Take, TerminalGenerator, Zip, block_last,
};

/// A sequence of zero or more items, terminated by completion or an error.
///
/// A `Flux` is a recipe: nothing happens until it is subscribed to. Operators such as
/// [`map()`][Self::map] and [`filter()`][Self::filter] consume the `Flux` and return a new
/// one describing the longer pipeline. Subscribing builds one chain of operator nodes for that
/// subscriber and starts the source.
///
/// Items only flow as far as the subscriber's demand allows. A subscriber that requests five
/// items gets at most five, no matter how fast the source could produce them. The lambda-style
/// consumers ([`for_each()`][Self::for_each] and friends) request unbounded demand.
///
/// A `Flux` can be subscribed to once. Wrap its construction in [`Flux::defer()`] to build a
/// fresh pipeline per subscriber.
///
/// # Example
///
/// ```rust
/// use trickle::Flux;
///
/// let squares: Vec<i64> = Flux::range(1, 5)
///     .map(|x| x * x)
///     .filter(|x| x % 2 == 1)
///     .into_blocking_iter()
///     .collect::<Result<_, _>>()
///     .unwrap();
///
/// assert_eq!(squares, vec![1, 9, 25]);
/// ```
pub struct Flux<T> {
    publisher: BoxPublisher<T>,
}

impl<T> Flux<T> {
    pub(crate) fn from_publisher<P>(publisher: P) -> Self
    where
        P: Publisher<T> + 'static,
    {
        Self {
            publisher: Box::new(publisher),
        }
    }

    /// Subscribes without the conformance guard. Used between operators inside the crate, where
    /// the signal contract is upheld by construction.
    pub(crate) fn attach(self, subscriber: BoxSubscriber<T>) {
        self.publisher.subscribe(subscriber);
    }
}

impl<T> Flux<T>
where
    T: Send + 'static,
{
    /// Emits the given items in order, then completes.
    #[must_use]
    pub fn just<const N: usize>(items: [T; N]) -> Self {
        Self::from_iterable(items)
    }

    /// Emits the items of an iterable in order, then completes.
    ///
    /// The sequence completes right after the last item, without waiting for further demand.
    #[must_use]
    pub fn from_iterable<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self::from_publisher(GeneratorPublisher::new(IterGenerator::new(items.into_iter())))
    }

    /// Calls `supplier` once per requested item. The sequence never completes on its own.
    ///
    /// # Example
    ///
    /// ```rust
    /// use trickle::Flux;
    ///
    /// let hellos: Vec<_> = Flux::generate(|| "hello")
    ///     .take(3)
    ///     .into_blocking_iter()
    ///     .collect::<Result<_, _>>()
    ///     .unwrap();
    ///
    /// assert_eq!(hellos, vec!["hello"; 3]);
    /// ```
    #[must_use]
    pub fn generate<F>(supplier: F) -> Self
    where
        F: FnMut() -> T + Send + 'static,
    {
        Self::from_publisher(GeneratorPublisher::new(SupplierGenerator::new(supplier)))
    }

    /// Completes immediately without emitting anything.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_publisher(GeneratorPublisher::new(TerminalGenerator::completed()))
    }

    /// Fails immediately with `error`. No demand is needed to receive it.
    #[must_use]
    pub fn error(error: Error) -> Self {
        Self::from_publisher(GeneratorPublisher::new(TerminalGenerator::failed(error)))
    }

    /// Calls `factory` to build the actual sequence at the moment of subscription.
    #[must_use]
    pub fn defer<F>(factory: F) -> Self
    where
        F: FnOnce() -> Self + Send + 'static,
    {
        Self::from_publisher(Defer::new(factory))
    }

    /// Transforms every item.
    #[must_use]
    pub fn map<U, F>(self, mut transform: F) -> Flux<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
    {
        self.try_map(move |item| Ok(transform(item)))
    }

    /// Transforms every item with a fallible function.
    ///
    /// An `Err` cancels upstream and terminates the sequence with that error.
    #[must_use]
    pub fn try_map<U, F>(self, transform: F) -> Flux<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> Result<U> + Send + 'static,
    {
        Flux::from_publisher(Map::new(self, transform))
    }

    /// Keeps only the items for which `predicate` returns `true`.
    #[must_use]
    pub fn filter<P>(self, mut predicate: P) -> Self
    where
        P: FnMut(&T) -> bool + Send + 'static,
    {
        self.try_filter(move |item| Ok(predicate(item)))
    }

    /// Keeps only the items for which `predicate` returns `Ok(true)`.
    ///
    /// An `Err` cancels upstream and terminates the sequence with that error.
    #[must_use]
    pub fn try_filter<P>(self, predicate: P) -> Self
    where
        P: FnMut(&T) -> Result<bool> + Send + 'static,
    {
        Self::from_publisher(Filter::new(self, predicate))
    }

    /// Maps every item to an inner sequence and merges the inner sequences as their items
    /// arrive.
    ///
    /// Up to [`DEFAULT_MAX_CONCURRENCY`][crate::DEFAULT_MAX_CONCURRENCY] inner sequences are
    /// subscribed at the same time. Items of different inner sequences may interleave.
    #[must_use]
    pub fn flat_map<U, F>(self, mapper: F) -> Flux<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> Flux<U> + Send + 'static,
    {
        self.flat_map_with(mapper, DEFAULT_MAX_CONCURRENCY)
    }

    /// Like [`flat_map()`][Self::flat_map], with an explicit bound on how many inner sequences
    /// are subscribed at the same time.
    ///
    /// A bound of one subscribes to the inner sequences strictly one after the other, which
    /// preserves their order.
    #[must_use]
    pub fn flat_map_with<U, F>(self, mapper: F, max_concurrency: NonZero<usize>) -> Flux<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> Flux<U> + Send + 'static,
    {
        Flux::from_publisher(FlatMap::new(self, mapper, max_concurrency))
    }

    /// Combines the n-th item of this sequence with the n-th item of `other`.
    ///
    /// The result is as long as the shorter of the two.
    #[must_use]
    pub fn zip_with<B, R, F>(self, other: Flux<B>, combiner: F) -> Flux<R>
    where
        B: Send + 'static,
        R: Send + 'static,
        F: FnMut(T, B) -> R + Send + 'static,
    {
        Flux::from_publisher(Zip::new(self, other, combiner))
    }

    /// Emits at most `limit` items, then cancels upstream and completes.
    ///
    /// Requests from downstream are capped so upstream is never asked for more than `limit`
    /// items in total.
    #[must_use]
    pub fn take(self, limit: u64) -> Self {
        Self::from_publisher(Take::new(self, limit))
    }

    /// Drops items that are equal to an item seen before.
    #[must_use]
    pub fn distinct(self) -> Self
    where
        T: Eq + Hash + Clone,
    {
        let mut seen = HashSet::new();
        self.filter(move |item| seen.insert(item.clone()))
    }

    /// Waits for the sequence to complete and re-emits its items in ascending order.
    #[must_use]
    pub fn sort(self) -> Self
    where
        T: Ord,
    {
        self.collect_list().into_flux().flat_map(|mut items| {
            items.sort();
            Self::from_iterable(items)
        })
    }

    /// Calls `hook` with every item before passing it on.
    #[must_use]
    pub fn do_on_next<F>(self, hook: F) -> Self
    where
        F: FnMut(&T) + Send + 'static,
    {
        Self::from_publisher(Peek::new(self, Hook::Next(Box::new(hook))))
    }

    /// Calls `hook` with the error before passing it on.
    #[must_use]
    pub fn do_on_error<F>(self, hook: F) -> Self
    where
        F: FnMut(&Error) + Send + 'static,
    {
        Self::from_publisher(Peek::new(self, Hook::Error(Box::new(hook))))
    }

    /// Calls `hook` when the sequence completes, before passing the completion on.
    #[must_use]
    pub fn do_on_complete<F>(self, hook: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self::from_publisher(Peek::new(self, Hook::Complete(Box::new(hook))))
    }

    /// Continues with `fallback` if this sequence completes without emitting anything.
    #[must_use]
    pub fn switch_if_empty(self, fallback: Self) -> Self {
        Self::from_publisher(SwitchIfEmpty::new(self, fallback))
    }

    /// Emits `value` if this sequence completes without emitting anything.
    #[must_use]
    pub fn default_if_empty(self, value: T) -> Self {
        self.switch_if_empty(Self::just([value]))
    }

    /// Logs every signal and every `request`/`cancel` passing this point as `info` events, with
    /// `category` as a field.
    #[must_use]
    pub fn log(self, category: &str) -> Self
    where
        T: Debug,
    {
        Self::from_publisher(Log::new(self, category))
    }

    /// Subscribes to this sequence on a worker of `scheduler` instead of the calling thread.
    ///
    /// `subscribe()` returns right away. Everything the source does while being subscribed,
    /// including emitting items requested from `on_subscribe`, happens on the worker.
    #[must_use]
    pub fn subscribe_on(self, scheduler: Scheduler) -> Self {
        Self::from_publisher(SubscribeOn::new(self, scheduler))
    }

    /// Collects all items into a `Vec`, emitted once the sequence completes.
    #[must_use]
    pub fn collect_list(self) -> Mono<Vec<T>> {
        Mono::from_publisher(CollectList::new(self))
    }

    /// Subscribes `subscriber` and starts the sequence.
    ///
    /// The subscriber is watched for contract violations on the publisher side: an item it did
    /// not request, or a signal after the end of the sequence, turns into
    /// [`Error::ProtocolViolation`] instead of reaching it.
    pub fn subscribe<S>(self, subscriber: S)
    where
        S: Subscriber<T> + 'static,
    {
        self.attach(Box::new(Guarded::new(Box::new(subscriber))));
    }

    /// Requests everything and ignores the items.
    ///
    /// # Panics
    ///
    /// The returned sequence panics in the thread that delivers the error if it fails, as there
    /// is no error callback to hand it to.
    pub fn consume(self) -> Disposable {
        self.subscribe_with(LambdaSubscriber::new(None, None, None))
    }

    /// Requests everything and calls `on_next` with each item.
    ///
    /// # Panics
    ///
    /// The returned sequence panics in the thread that delivers the error if it fails, as there
    /// is no error callback to hand it to.
    pub fn for_each<N>(self, on_next: N) -> Disposable
    where
        N: FnMut(T) + Send + 'static,
    {
        self.subscribe_with(LambdaSubscriber::new(Some(Box::new(on_next)), None, None))
    }

    /// Requests everything and calls the matching callback for each signal.
    pub fn for_each_with<N, E, C>(self, on_next: N, on_error: E, on_complete: C) -> Disposable
    where
        N: FnMut(T) + Send + 'static,
        E: FnMut(Error) + Send + 'static,
        C: FnMut() + Send + 'static,
    {
        self.subscribe_with(LambdaSubscriber::new(
            Some(Box::new(on_next)),
            Some(Box::new(on_error)),
            Some(Box::new(on_complete)),
        ))
    }

    fn subscribe_with(self, subscriber: LambdaSubscriber<T>) -> Disposable {
        let disposable = subscriber.disposable();
        self.subscribe(subscriber);
        disposable
    }

    /// Subscribes with unbounded demand and blocks until the sequence terminates.
    ///
    /// Returns the last item, or `None` for an empty sequence.
    ///
    /// # Errors
    ///
    /// Returns the error that terminated the sequence.
    pub fn block_last(self) -> Result<Option<T>> {
        block_last(self)
    }

    /// Returns an iterator that blocks for each next item.
    ///
    /// At most [`DEFAULT_BLOCKING_PREFETCH`][crate::DEFAULT_BLOCKING_PREFETCH] items are
    /// requested ahead of what the iterator has handed out. Dropping the iterator cancels the
    /// sequence.
    #[must_use]
    pub fn into_blocking_iter(self) -> BlockingIter<T> {
        BlockingIter::new(self, DEFAULT_BLOCKING_PREFETCH)
    }
}

impl<A, B> Flux<(A, B)>
where
    A: Send + 'static,
    B: Send + 'static,
{
    /// Pairs the n-th item of `left` with the n-th item of `right`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use trickle::Flux;
    ///
    /// let pairs = Flux::zip(Flux::just([1, 2, 3]), Flux::just(["a", "b"]))
    ///     .collect_list()
    ///     .block()
    ///     .unwrap();
    ///
    /// assert_eq!(pairs, Some(vec![(1, "a"), (2, "b")]));
    /// ```
    #[must_use]
    pub fn zip(left: Flux<A>, right: Flux<B>) -> Self {
        left.zip_with(right, |a, b| (a, b))
    }
}

impl Flux<i64> {
    /// Emits `count` consecutive integers starting at `start`.
    ///
    /// The sequence stops early rather than overflowing `i64`.
    #[must_use]
    pub fn range(start: i64, count: u64) -> Self {
        Self::from_iterable(
            (0..count).map_while(move |offset| {
                i64::try_from(offset)
                    .ok()
                    .and_then(|offset| start.checked_add(offset))
            }),
        )
    }
}

impl Flux<u64> {
    /// Emits `0, 1, 2, ...`, one number per `period`, on a dedicated timer thread.
    ///
    /// The sequence never completes on its own; bound it with [`take()`][Self::take] or cancel
    /// it. The timer stops as soon as the subscription is cancelled or terminated.
    ///
    /// A tick that fires while the subscriber has no outstanding demand cannot be held back, so
    /// the sequence fails with [`Error::Overflow`].
    #[must_use]
    pub fn interval(period: Duration) -> Self {
        Self::from_publisher(Interval::new(period))
    }
}

impl<T> Debug for Flux<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flux").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use parking_lot::Mutex;
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::TestSubscriber;

    assert_impl_all!(Flux<i32>: Send);

    #[test]
    fn range_counts_from_start() {
        let probe = TestSubscriber::new();
        Flux::range(5, 3).subscribe(probe.clone());

        assert_eq!(probe.items(), vec![5, 6, 7]);
    }

    #[test]
    fn range_stops_before_overflow() {
        let probe = TestSubscriber::new();
        Flux::range(i64::MAX - 1, 5).subscribe(probe.clone());

        assert_eq!(probe.items(), vec![i64::MAX - 1, i64::MAX]);
        assert!(probe.is_completed());
    }

    #[test]
    fn distinct_drops_repeats() {
        let probe = TestSubscriber::new();
        Flux::just([1, 2, 1, 3, 2, 4]).distinct().subscribe(probe.clone());

        assert_eq!(probe.items(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn sort_orders_items() {
        let probe = TestSubscriber::new();
        Flux::just(["pear", "apple", "fig"]).sort().subscribe(probe.clone());

        assert_eq!(probe.items(), vec!["apple", "fig", "pear"]);
        assert!(probe.is_completed());
    }

    #[test]
    fn for_each_with_routes_signals() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let completed = Arc::new(AtomicBool::new(false));

        let disposable = Flux::just([1, 2, 3]).for_each_with(
            {
                let seen = Arc::clone(&seen);
                move |item| seen.lock().push(item)
            },
            |error| panic!("unexpected error: {error}"),
            {
                let completed = Arc::clone(&completed);
                move || completed.store(true, Ordering::Relaxed)
            },
        );

        assert_eq!(*seen.lock(), vec![1, 2, 3]);
        assert!(completed.load(Ordering::Relaxed));
        assert!(!disposable.is_disposed());
    }

    #[test]
    fn for_each_with_receives_error() {
        let failure = Arc::new(Mutex::new(None));

        Flux::<i32>::error(Error::msg("boom")).for_each_with(
            |_| {},
            {
                let failure = Arc::clone(&failure);
                move |error| *failure.lock() = Some(error.to_string())
            },
            || {},
        );

        assert!(failure.lock().as_deref().is_some_and(|text| text.contains("boom")));
    }

    #[test]
    #[should_panic(expected = "error callback not implemented")]
    fn for_each_without_error_callback_panics_on_error() {
        Flux::<i32>::error(Error::msg("unhandled")).for_each(|_| {});
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn dispose_cancels_running_sequence() {
        let seen = Arc::new(Mutex::new(Vec::new()));

        let disposable = Flux::interval(Duration::from_secs(3600)).for_each({
            let seen = Arc::clone(&seen);
            move |tick| seen.lock().push(tick)
        });

        disposable.dispose();

        assert!(disposable.is_disposed());
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn consume_runs_side_effects() {
        let count = Arc::new(Mutex::new(0));

        Flux::range(0, 4)
            .do_on_next({
                let count = Arc::clone(&count);
                move |_| *count.lock() += 1
            })
            .consume();

        assert_eq!(*count.lock(), 4);
    }

    #[test]
    fn block_last_waits_for_completion() {
        assert_eq!(Flux::just(["a", "b"]).block_last().unwrap(), Some("b"));
    }
}
