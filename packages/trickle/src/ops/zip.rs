use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::constants::DEFAULT_ZIP_PREFETCH;
use crate::{
    BoxSubscriber, Demand, Drain, Error, Flux, Publisher, Subscriber, Subscription,
    SubscriptionHandle, SubscriptionSlot,
};

/// Pairs the n-th item of one sequence with the n-th item of another.
///
/// Whichever side is ahead is buffered, up to the prefetch amount. The result completes as soon
/// as one side has completed and its buffer is empty, cancelling the other side.
pub(crate) struct Zip<A, B, R, F> {
    left: Flux<A>,
    right: Flux<B>,
    combiner: F,
    _result: PhantomData<fn() -> R>,
}

impl<A, B, R, F> Zip<A, B, R, F> {
    pub(crate) fn new(left: Flux<A>, right: Flux<B>, combiner: F) -> Self {
        Self {
            left,
            right,
            combiner,
            _result: PhantomData,
        }
    }
}

impl<A, B, R, F> Publisher<R> for Zip<A, B, R, F>
where
    A: Send + 'static,
    B: Send + 'static,
    R: Send + 'static,
    F: FnMut(A, B) -> R + Send + 'static,
{
    fn subscribe(self: Box<Self>, mut subscriber: BoxSubscriber<R>) {
        let Self {
            left,
            right,
            combiner,
            ..
        } = *self;

        let zip = Arc::new(ZipState {
            demand: Demand::new(),
            drain: Drain::held(),
            cancelled: AtomicBool::new(false),
            invalid: AtomicBool::new(false),
            left: SubscriptionSlot::new(),
            right: SubscriptionSlot::new(),
            buffers: Mutex::new(Buffers {
                left: VecDeque::new(),
                right: VecDeque::new(),
                left_done: false,
                right_done: false,
                error: None,
            }),
            sink: Mutex::new(None),
        });

        subscriber.on_subscribe(Arc::clone(&zip) as SubscriptionHandle);
        *zip.sink.lock() = Some(Sink {
            subscriber,
            combiner,
        });
        zip.drain.run(|| zip.pass());

        if zip.cancelled.load(Ordering::Acquire) {
            return;
        }

        left.attach(Box::new(SideSubscriber {
            zip: Arc::clone(&zip),
            slot: |zip| &zip.left,
            push: |buffers, item| buffers.left.push_back(item),
            finish: |buffers| buffers.left_done = true,
        }));

        right.attach(Box::new(SideSubscriber {
            zip,
            slot: |zip| &zip.right,
            push: |buffers, item| buffers.right.push_back(item),
            finish: |buffers| buffers.right_done = true,
        }));
    }
}

impl<A, B, R, F> fmt::Debug for Zip<A, B, R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Zip").finish_non_exhaustive()
    }
}

struct Buffers<A, B> {
    left: VecDeque<A>,
    right: VecDeque<B>,
    left_done: bool,
    right_done: bool,
    error: Option<Error>,
}

impl<A, B> Buffers<A, B> {
    /// No further pair can be formed.
    fn exhausted(&self) -> bool {
        (self.left_done && self.left.is_empty()) || (self.right_done && self.right.is_empty())
    }
}

struct Sink<R, F> {
    subscriber: BoxSubscriber<R>,
    combiner: F,
}

struct ZipState<A, B, R, F> {
    demand: Demand,
    drain: Drain,
    cancelled: AtomicBool,
    invalid: AtomicBool,
    left: SubscriptionSlot,
    right: SubscriptionSlot,
    buffers: Mutex<Buffers<A, B>>,

    // Only ever locked by the current holder of the drain.
    sink: Mutex<Option<Sink<R, F>>>,
}

impl<A, B, R, F> ZipState<A, B, R, F>
where
    A: Send + 'static,
    B: Send + 'static,
    R: Send + 'static,
    F: FnMut(A, B) -> R + Send + 'static,
{
    fn signal(&self) {
        self.drain.signal(|| self.pass());
    }

    fn cancel_sources(&self) {
        {
            let mut buffers = self.buffers.lock();
            buffers.left.clear();
            buffers.right.clear();
        }

        self.left.cancel();
        self.right.cancel();
    }

    fn pass(&self) {
        let mut sink = self.sink.lock();

        loop {
            if sink.is_none() {
                return;
            }

            if self.cancelled.load(Ordering::Acquire) {
                *sink = None;
                self.cancel_sources();
                return;
            }

            let failure = if self.invalid.load(Ordering::Acquire) {
                Some(Error::InvalidDemand { requested: 0 })
            } else {
                self.buffers.lock().error.take()
            };

            if let Some(error) = failure {
                self.cancel_sources();

                if let Some(mut sink) = sink.take() {
                    sink.subscriber.on_error(error);
                }
                return;
            }

            let mut buffers = self.buffers.lock();

            if self.demand.current() > 0 && !buffers.left.is_empty() && !buffers.right.is_empty()
            {
                let pair = buffers.left.pop_front().zip(buffers.right.pop_front());
                drop(buffers);

                if let (Some((a, b)), Some(sink)) = (pair, sink.as_mut()) {
                    self.demand.produced(1);

                    let combined = (sink.combiner)(a, b);
                    sink.subscriber.on_next(combined);
                }

                self.left.request(1);
                self.right.request(1);
                continue;
            }

            let exhausted = buffers.exhausted();
            drop(buffers);

            if exhausted {
                self.cancel_sources();

                if let Some(mut sink) = sink.take() {
                    sink.subscriber.on_complete();
                }
            }

            return;
        }
    }
}

impl<A, B, R, F> Subscription for ZipState<A, B, R, F>
where
    A: Send + 'static,
    B: Send + 'static,
    R: Send + 'static,
    F: FnMut(A, B) -> R + Send + 'static,
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

impl<A, B, R, F> fmt::Debug for ZipState<A, B, R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipState")
            .field("demand", &self.demand)
            .field("cancelled", &self.cancelled)
            .field("left", &self.left)
            .field("right", &self.right)
            .finish_non_exhaustive()
    }
}

type SlotFn<A, B, R, F> = fn(&ZipState<A, B, R, F>) -> &SubscriptionSlot;

/// Feeds one side of the zip. The function pointers select which side.
struct SideSubscriber<A, B, R, F, V> {
    zip: Arc<ZipState<A, B, R, F>>,
    slot: SlotFn<A, B, R, F>,
    push: fn(&mut Buffers<A, B>, V),
    finish: fn(&mut Buffers<A, B>),
}

impl<A, B, R, F, V> Subscriber<V> for SideSubscriber<A, B, R, F, V>
where
    A: Send + 'static,
    B: Send + 'static,
    R: Send + 'static,
    F: FnMut(A, B) -> R + Send + 'static,
{
    fn on_subscribe(&mut self, subscription: SubscriptionHandle) {
        let slot = (self.slot)(&self.zip);
        slot.set(subscription);
        slot.request(DEFAULT_ZIP_PREFETCH);
    }

    fn on_next(&mut self, item: V) {
        (self.push)(&mut self.zip.buffers.lock(), item);
        self.zip.signal();
    }

    fn on_error(&mut self, error: Error) {
        self.zip.buffers.lock().error.get_or_insert(error);
        self.zip.signal();
    }

    fn on_complete(&mut self) {
        (self.finish)(&mut self.zip.buffers.lock());
        self.zip.signal();
    }
}
