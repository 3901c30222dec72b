use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    BoxSubscriber, Error, Flux, Publisher, Subscriber, Subscription, SubscriptionHandle,
    UNBOUNDED,
};

/// Mirrors upstream, or switches to a fallback sequence if upstream completes without items.
pub(crate) struct SwitchIfEmpty<T> {
    upstream: Flux<T>,
    fallback: Flux<T>,
}

impl<T> SwitchIfEmpty<T> {
    pub(crate) fn new(upstream: Flux<T>, fallback: Flux<T>) -> Self {
        Self { upstream, fallback }
    }
}

impl<T> Publisher<T> for SwitchIfEmpty<T>
where
    T: Send + 'static,
{
    fn subscribe(self: Box<Self>, subscriber: BoxSubscriber<T>) {
        let Self { upstream, fallback } = *self;

        upstream.attach(Box::new(SwitchSubscriber {
            downstream: Some(subscriber),
            arbiter: Arc::new(Arbiter::default()),
            fallback: Some(fallback),
            seen_item: false,
        }));
    }
}

impl<T> fmt::Debug for SwitchIfEmpty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwitchIfEmpty").finish_non_exhaustive()
    }
}

#[derive(Default)]
struct ArbiterState {
    current: Option<SubscriptionHandle>,

    /// Demand not yet satisfied by the current source, carried over to the fallback.
    outstanding: u64,
    cancelled: bool,
}

impl fmt::Debug for ArbiterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArbiterState")
            .field("filled", &self.current.is_some())
            .field("outstanding", &self.outstanding)
            .field("cancelled", &self.cancelled)
            .finish()
    }
}

/// The one subscription downstream sees, routed to whichever source is active.
#[derive(Debug, Default)]
struct Arbiter {
    state: Mutex<ArbiterState>,
}

impl Arbiter {
    /// Makes `subscription` the active source and hands it the carried-over demand.
    fn switch_to(&self, subscription: SubscriptionHandle, carry_demand: bool) {
        let outstanding = {
            let mut state = self.state.lock();

            if state.cancelled {
                None
            } else {
                state.current = Some(Arc::clone(&subscription));
                Some(state.outstanding)
            }
        };

        match outstanding {
            None => subscription.cancel(),
            Some(outstanding) if carry_demand && outstanding > 0 => {
                subscription.request(outstanding);
            }
            Some(_) => {}
        }
    }

    fn produced(&self) {
        let mut state = self.state.lock();

        if state.outstanding != UNBOUNDED {
            state.outstanding = state.outstanding.saturating_sub(1);
        }
    }
}

impl Subscription for Arbiter {
    fn request(&self, n: u64) {
        let current = {
            let mut state = self.state.lock();
            state.outstanding = state.outstanding.saturating_add(n);
            state.current.as_ref().map(Arc::clone)
        };

        if let Some(current) = current {
            current.request(n);
        }
    }

    fn cancel(&self) {
        let current = {
            let mut state = self.state.lock();
            state.cancelled = true;
            state.current.take()
        };

        if let Some(current) = current {
            current.cancel();
        }
    }
}

struct SwitchSubscriber<T> {
    // Moves to the fallback subscriber on switch.
    downstream: Option<BoxSubscriber<T>>,
    arbiter: Arc<Arbiter>,

    // `None` once switched: the fallback is subscribed with this set to `None`.
    fallback: Option<Flux<T>>,
    seen_item: bool,
}

impl<T> Subscriber<T> for SwitchSubscriber<T>
where
    T: Send + 'static,
{
    fn on_subscribe(&mut self, subscription: SubscriptionHandle) {
        let is_first = self.fallback.is_some();
        self.arbiter.switch_to(subscription, !is_first);

        if is_first {
            if let Some(downstream) = &mut self.downstream {
                downstream.on_subscribe(Arc::clone(&self.arbiter) as SubscriptionHandle);
            }
        }
    }

    fn on_next(&mut self, item: T) {
        self.seen_item = true;
        self.arbiter.produced();

        if let Some(downstream) = &mut self.downstream {
            downstream.on_next(item);
        }
    }

    fn on_error(&mut self, error: Error) {
        if let Some(downstream) = &mut self.downstream {
            downstream.on_error(error);
        }
    }

    fn on_complete(&mut self) {
        if !self.seen_item {
            if let (Some(fallback), Some(downstream)) = (self.fallback.take(), self.downstream.take())
            {
                fallback.attach(Box::new(Self {
                    downstream: Some(downstream),
                    arbiter: Arc::clone(&self.arbiter),
                    fallback: None,
                    seen_item: false,
                }));
                return;
            }
        }

        if let Some(downstream) = &mut self.downstream {
            downstream.on_complete();
        }
    }
}
