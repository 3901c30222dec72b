//! The emission loop shared by all sources.
//!
//! A source only has to describe how to produce its next item ([`Generator`]). The
//! [`Emitter`] owns the subscriber and does the rest: it is the subscription handed downstream,
//! it accumulates demand, serializes emission through a [`Drain`] and makes sure exactly one
//! terminal signal is delivered unless the subscriber cancels first.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::{BoxSubscriber, Demand, Drain, Error, Subscription, SubscriptionHandle};

/// Outcome of asking a generator for its next item.
#[derive(Debug)]
pub(crate) enum Step<T> {
    Next(T),

    /// No item is available right now. The source will wake the emitter when one is.
    Pending,

    Complete,

    Fail(Error),
}

pub(crate) trait Generator<T>: Send + 'static {
    /// Produces the next item. Only called when the subscriber has outstanding demand.
    fn step(&mut self) -> Step<T>;

    /// Reports a terminal outcome that does not need demand to be delivered, such as an
    /// exhausted iterator or a failed timer.
    ///
    /// `outstanding` is the demand left after the last emitted item. It cannot shrink while this
    /// runs.
    fn ended(&mut self, _outstanding: u64) -> Option<Result<(), Error>> {
        None
    }
}

struct Active<T, G> {
    generator: G,
    subscriber: BoxSubscriber<T>,
}

pub(crate) struct Emitter<T, G> {
    demand: Demand,
    drain: Drain,
    cancelled: AtomicBool,
    invalid: AtomicBool,

    // Only ever locked by the current holder of the drain.
    active: Mutex<Option<Active<T, G>>>,
}

impl<T, G> Emitter<T, G>
where
    T: 'static,
    G: Generator<T>,
{
    /// Subscribes `subscriber` to the items of `generator` and emits whatever it requested
    /// from inside `on_subscribe`.
    pub(crate) fn start(generator: G, mut subscriber: BoxSubscriber<T>) -> Arc<Self> {
        let emitter = Arc::new(Self {
            demand: Demand::new(),
            drain: Drain::held(),
            cancelled: AtomicBool::new(false),
            invalid: AtomicBool::new(false),
            active: Mutex::new(None),
        });

        subscriber.on_subscribe(Arc::clone(&emitter) as SubscriptionHandle);
        *emitter.active.lock() = Some(Active {
            generator,
            subscriber,
        });

        emitter.drain.run(|| emitter.pass());
        emitter
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Tells the emitter that the generator may have new items or a new terminal outcome.
    pub(crate) fn wake(&self) {
        self.drain.signal(|| self.pass());
    }

    fn pass(&self) {
        let mut active = self.active.lock();

        loop {
            let Some(current) = active.as_mut() else {
                return;
            };

            if self.is_cancelled() {
                // Dropping the generator releases whatever the source holds (timers, iterators).
                *active = None;
                return;
            }

            if self.invalid.load(Ordering::Acquire) {
                Self::finish(&mut active, Err(Error::InvalidDemand { requested: 0 }));
                return;
            }

            if self.demand.current() == 0 {
                break;
            }

            match current.generator.step() {
                Step::Next(item) => {
                    self.demand.produced(1);
                    current.subscriber.on_next(item);
                }
                Step::Pending => break,
                Step::Complete => {
                    Self::finish(&mut active, Ok(()));
                    return;
                }
                Step::Fail(error) => {
                    Self::finish(&mut active, Err(error));
                    return;
                }
            }
        }

        if self.is_cancelled() {
            *active = None;
            return;
        }

        let outstanding = self.demand.current();
        let ended = active
            .as_mut()
            .and_then(|current| current.generator.ended(outstanding));

        if let Some(outcome) = ended {
            Self::finish(&mut active, outcome);
        }
    }

    fn finish(active: &mut MutexGuard<'_, Option<Active<T, G>>>, outcome: Result<(), Error>) {
        let Some(Active {
            generator,
            mut subscriber,
        }) = active.take()
        else {
            return;
        };

        drop(generator);

        match outcome {
            Ok(()) => subscriber.on_complete(),
            Err(error) => subscriber.on_error(error),
        }
    }
}

impl<T, G> Subscription for Emitter<T, G>
where
    T: 'static,
    G: Generator<T>,
{
    fn request(&self, n: u64) {
        if n == 0 {
            self.invalid.store(true, Ordering::Release);
        } else {
            self.demand.add(n);
        }

        self.drain.signal(|| self.pass());
    }

    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.drain.signal(|| self.pass());
        }
    }
}

impl<T, G> fmt::Debug for Emitter<T, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("demand", &self.demand)
            .field("cancelled", &self.cancelled)
            .field("invalid", &self.invalid)
            .finish_non_exhaustive()
    }
}
