use std::fmt;

use crate::{BoxSubscriber, Error, Flux, Publisher, Subscriber, SubscriptionHandle};

type NextHook<T> = Box<dyn FnMut(&T) + Send>;
type ErrorHook = Box<dyn FnMut(&Error) + Send>;
type CompleteHook = Box<dyn FnMut() + Send>;

/// Side-effect hooks that observe signals without changing them.
pub(crate) enum Hook<T> {
    Next(NextHook<T>),
    Error(ErrorHook),
    Complete(CompleteHook),
}

/// Runs a hook as signals pass by. Hooks run before the signal is forwarded downstream.
pub(crate) struct Peek<T> {
    upstream: Flux<T>,
    hook: Hook<T>,
}

impl<T> Peek<T> {
    pub(crate) fn new(upstream: Flux<T>, hook: Hook<T>) -> Self {
        Self { upstream, hook }
    }
}

impl<T> Publisher<T> for Peek<T>
where
    T: Send + 'static,
{
    fn subscribe(self: Box<Self>, subscriber: BoxSubscriber<T>) {
        let Self { upstream, hook } = *self;

        upstream.attach(Box::new(PeekSubscriber {
            downstream: subscriber,
            hook,
        }));
    }
}

impl<T> fmt::Debug for Peek<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peek").finish_non_exhaustive()
    }
}

struct PeekSubscriber<T> {
    downstream: BoxSubscriber<T>,
    hook: Hook<T>,
}

impl<T> Subscriber<T> for PeekSubscriber<T>
where
    T: Send,
{
    fn on_subscribe(&mut self, subscription: SubscriptionHandle) {
        self.downstream.on_subscribe(subscription);
    }

    fn on_next(&mut self, item: T) {
        if let Hook::Next(hook) = &mut self.hook {
            hook(&item);
        }

        self.downstream.on_next(item);
    }

    fn on_error(&mut self, error: Error) {
        if let Hook::Error(hook) = &mut self.hook {
            hook(&error);
        }

        self.downstream.on_error(error);
    }

    fn on_complete(&mut self) {
        if let Hook::Complete(hook) = &mut self.hook {
            hook();
        }

        self.downstream.on_complete();
    }
}
