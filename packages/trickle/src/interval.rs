//! Timer-driven source emitting `0, 1, 2, ...` once per period.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace};

use crate::{BoxSubscriber, Emitter, Error, Generator, Publisher, Step};

/// Hands out ticks fired by the timer thread.
///
/// Overflow is decided here, inside the emitter's drain, where demand and delivered ticks only
/// ever change together. The timer thread just counts ticks.
struct IntervalGenerator {
    fired: Arc<AtomicU64>,
    delivered: u64,

    // Dropped together with the generator, which stops the timer thread.
    _stop: Sender<()>,
}

impl IntervalGenerator {
    fn new(fired: Arc<AtomicU64>, stop: Sender<()>) -> Self {
        Self {
            fired,
            delivered: 0,
            _stop: stop,
        }
    }

    fn has_pending(&self) -> bool {
        self.delivered < self.fired.load(Ordering::Acquire)
    }
}

impl Generator<u64> for IntervalGenerator {
    fn step(&mut self) -> Step<u64> {
        if !self.has_pending() {
            return Step::Pending;
        }

        let tick = self.delivered;
        self.delivered = self.delivered.saturating_add(1);
        Step::Next(tick)
    }

    fn ended(&mut self, outstanding: u64) -> Option<Result<(), Error>> {
        (outstanding == 0 && self.has_pending()).then(|| {
            Err(Error::Overflow {
                tick: self.delivered,
            })
        })
    }
}

type IntervalEmitter = Emitter<u64, IntervalGenerator>;

pub(crate) struct Interval {
    period: Duration,
}

impl Interval {
    pub(crate) fn new(period: Duration) -> Self {
        Self { period }
    }
}

impl Publisher<u64> for Interval {
    fn subscribe(self: Box<Self>, subscriber: BoxSubscriber<u64>) {
        let fired = Arc::new(AtomicU64::new(0));
        let (stop_tx, stop_rx) = channel::bounded(0);

        let emitter = Emitter::start(IntervalGenerator::new(Arc::clone(&fired), stop_tx), subscriber);

        if emitter.is_cancelled() {
            return;
        }

        let emitter = Arc::downgrade(&emitter);
        let period = self.period;

        thread::Builder::new()
            .name("trickle-interval".to_string())
            .spawn(move || {
                debug!(?period, "interval timer started");
                run_timer(period, &fired, &emitter, &stop_rx);
                debug!("interval timer exiting");
            })
            .expect("failed to spawn interval timer thread: thread spawning failure is not supported");
    }
}

impl fmt::Debug for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interval")
            .field("period", &self.period)
            .finish()
    }
}

fn run_timer(
    period: Duration,
    fired: &AtomicU64,
    emitter: &Weak<IntervalEmitter>,
    stop: &Receiver<()>,
) {
    let started = Instant::now();
    let mut deadline = started;

    for index in 0_u64.. {
        // Deadlines are relative to the start so that slow subscribers do not cause drift.
        deadline = match deadline.checked_add(period) {
            Some(next) => next,
            None => return,
        };

        match stop.recv_deadline(deadline) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }

        let Some(emitter) = emitter.upgrade() else {
            return;
        };

        fired.fetch_add(1, Ordering::Release);
        trace!(index, "interval tick");

        // A tick without demand ends the sequence, which drops the generator and closes `stop`.
        emitter.wake();
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{TestSubscriber, UNBOUNDED};

    fn generator() -> (IntervalGenerator, Arc<AtomicU64>, Receiver<()>) {
        let fired = Arc::new(AtomicU64::new(0));
        let (stop_tx, stop_rx) = channel::bounded(0);

        (
            IntervalGenerator::new(Arc::clone(&fired), stop_tx),
            fired,
            stop_rx,
        )
    }

    #[test]
    fn generator_delivers_fired_ticks_in_order() {
        let (mut generator, fired, _stop) = generator();

        assert!(matches!(generator.step(), Step::Pending));

        fired.store(2, Ordering::Release);

        assert!(matches!(generator.step(), Step::Next(0)));
        assert!(matches!(generator.step(), Step::Next(1)));
        assert!(matches!(generator.step(), Step::Pending));
        assert!(generator.ended(5).is_none());
    }

    #[test]
    fn pending_tick_with_demand_is_not_an_overflow() {
        let (mut generator, fired, _stop) = generator();
        fired.store(1, Ordering::Release);

        assert!(generator.ended(1).is_none());
        assert!(generator.ended(UNBOUNDED).is_none());
    }

    #[test]
    fn pending_tick_without_demand_is_an_overflow() {
        let (mut generator, fired, _stop) = generator();
        fired.store(3, Ordering::Release);

        assert!(matches!(generator.step(), Step::Next(0)));
        assert!(matches!(
            generator.ended(0),
            Some(Err(Error::Overflow { tick: 1 }))
        ));
    }

    #[test]
    fn no_pending_tick_is_never_an_overflow() {
        let (mut generator, _fired, _stop) = generator();

        assert!(generator.ended(0).is_none());
    }

    #[test]
    fn tick_beyond_demand_is_never_delivered() {
        let (generator, fired, stop) = generator();

        // Three ticks fire before the emitter gets to run, but only one was requested.
        fired.store(3, Ordering::Release);

        let probe = TestSubscriber::with_initial_request(1);
        let emitter = Emitter::start(generator, Box::new(probe.clone()));
        emitter.wake();

        assert_eq!(probe.items(), vec![0]);
        assert!(matches!(probe.error(), Some(Error::Overflow { tick: 1 })));

        // Terminating dropped the generator, which tells the timer thread to stop.
        assert!(matches!(
            stop.try_recv(),
            Err(channel::TryRecvError::Disconnected)
        ));
    }
}
