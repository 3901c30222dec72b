use std::fmt::{self, Debug};
use std::sync::Arc;

use tracing::info;

use crate::{
    BoxSubscriber, Error, Flux, Publisher, Signal, Subscriber, Subscription, SubscriptionHandle,
    UNBOUNDED,
};

/// Logs every signal and every `request`/`cancel` crossing this point at `info` level.
pub(crate) struct Log<T> {
    upstream: Flux<T>,
    category: Arc<str>,
}

impl<T> Log<T> {
    pub(crate) fn new(upstream: Flux<T>, category: &str) -> Self {
        Self {
            upstream,
            category: Arc::from(category),
        }
    }
}

impl<T> Publisher<T> for Log<T>
where
    T: Debug + Send + 'static,
{
    fn subscribe(self: Box<Self>, subscriber: BoxSubscriber<T>) {
        let Self { upstream, category } = *self;

        upstream.attach(Box::new(LogSubscriber {
            downstream: subscriber,
            category,
        }));
    }
}

impl<T> fmt::Debug for Log<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Log")
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

struct LogSubscriber<T> {
    downstream: BoxSubscriber<T>,
    category: Arc<str>,
}

impl<T> Subscriber<T> for LogSubscriber<T>
where
    T: Debug + Send,
{
    fn on_subscribe(&mut self, subscription: SubscriptionHandle) {
        log_signal(&self.category, &Signal::<&T>::OnSubscribe(Arc::clone(&subscription)));

        self.downstream.on_subscribe(Arc::new(LogSubscription {
            inner: subscription,
            category: Arc::clone(&self.category),
        }));
    }

    fn on_next(&mut self, item: T) {
        log_signal(&self.category, &Signal::OnNext(&item));
        self.downstream.on_next(item);
    }

    fn on_error(&mut self, error: Error) {
        log_signal(&self.category, &Signal::<&T>::OnError(error.clone()));
        self.downstream.on_error(error);
    }

    fn on_complete(&mut self) {
        log_signal(&self.category, &Signal::<&T>::OnComplete);
        self.downstream.on_complete();
    }
}

fn log_signal<T>(category: &str, signal: &Signal<T>)
where
    T: Debug,
{
    info!(category, signal = signal.name(), "{signal:?}");
}

struct LogSubscription {
    inner: SubscriptionHandle,
    category: Arc<str>,
}

impl Subscription for LogSubscription {
    fn request(&self, n: u64) {
        if n == UNBOUNDED {
            info!(category = %self.category, "request(unbounded)");
        } else {
            info!(category = %self.category, "request({n})");
        }

        self.inner.request(n);
    }

    fn cancel(&self) {
        info!(category = %self.category, "cancel()");
        self.inner.cancel();
    }
}
