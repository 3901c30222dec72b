//! Demand bookkeeping shared by every publisher in the crate.
//!
//! Two small atomics carry the whole backpressure protocol:
//!
//! * [`Demand`] is the outstanding `requested` counter of one subscription. Subscribers add to
//!   it (saturating at [`UNBOUNDED`]), the emission loop subtracts what it emitted.
//! * [`Drain`] is the work-in-progress counter that serializes the emission loop. Whoever moves
//!   it away from zero becomes the single active emitter; every other caller (a `request()`
//!   from inside `on_next`, a timer tick, a `request()` from another thread) only bumps the
//!   counter and leaves, and the active emitter loops again before releasing its role. No
//!   signal is lost, none is delivered twice and the stack never grows with re-entrant calls.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::UNBOUNDED;

/// Outstanding demand of one subscription.
#[derive(Debug, Default)]
pub(crate) struct Demand {
    requested: AtomicU64,
}

impl Demand {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds `n` to the outstanding demand, saturating at [`UNBOUNDED`].
    ///
    /// Returns the demand as it was before the addition.
    pub(crate) fn add(&self, n: u64) -> u64 {
        let previous = self
            .requested
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(n))
            });

        match previous {
            Ok(value) | Err(value) => value,
        }
    }

    pub(crate) fn current(&self) -> u64 {
        self.requested.load(Ordering::Acquire)
    }

    pub(crate) fn is_unbounded(&self) -> bool {
        self.current() == UNBOUNDED
    }

    /// Records that `n` items were emitted against the outstanding demand.
    ///
    /// Unbounded demand is never decremented. Returns the remaining demand.
    pub(crate) fn produced(&self, n: u64) -> u64 {
        let previous = self
            .requested
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current == UNBOUNDED {
                    None
                } else {
                    Some(current.saturating_sub(n))
                }
            });

        match previous {
            Ok(value) => value.saturating_sub(n),
            Err(value) => value,
        }
    }
}

/// Work-in-progress counter guarding a drain loop.
#[derive(Debug, Default)]
pub(crate) struct Drain {
    work: AtomicU64,
}

impl Drain {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Creates the counter already held by the caller.
    ///
    /// Publishers use this while they call `on_subscribe`: any demand signalled from inside
    /// that call is recorded as missed work and picked up by the subsequent [`Drain::run()`].
    pub(crate) fn held() -> Self {
        Self {
            work: AtomicU64::new(1),
        }
    }

    /// Signals that there is work to do and runs `pass` if nobody else is draining.
    pub(crate) fn signal(&self, pass: impl FnMut()) {
        if self.work.fetch_add(1, Ordering::AcqRel) == 0 {
            self.run(pass);
        }
    }

    /// Runs `pass` until no more work has been signalled, then releases the drain.
    ///
    /// Must only be called by the current holder of the drain.
    pub(crate) fn run(&self, mut pass: impl FnMut()) {
        let mut missed = 1;

        loop {
            pass();

            let previous = self.work.fetch_sub(missed, Ordering::AcqRel);
            missed = previous.saturating_sub(missed);

            if missed == 0 {
                break;
            }
        }
    }
}
