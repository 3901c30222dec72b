use std::fmt::{self, Debug};
use std::future::IntoFuture;

use new_zealand::nz;

use crate::{
    Disposable, Error, First, Flux, MonoFuture, Publisher, Result, Scheduler, Subscriber,
    block_last,
};

/// A sequence of at most one item, terminated by completion or an error.
///
/// `Mono` follows the same demand protocol as [`Flux`] and offers the subset of operators that
/// keep the "at most one" guarantee. Use [`Mono::into_flux()`] to reach the rest.
///
/// A `Mono` can be awaited: it implements [`IntoFuture`] with the item (or `None` when it
/// completes empty) as the output.
///
/// # Example
///
/// ```rust
/// use trickle::Mono;
///
/// let greeting = Mono::just("world")
///     .map(|name| format!("hello, {name}"))
///     .block()
///     .unwrap();
///
/// assert_eq!(greeting.as_deref(), Some("hello, world"));
/// ```
pub struct Mono<T> {
    flux: Flux<T>,
}

impl<T> Mono<T> {
    pub(crate) fn from_publisher<P>(publisher: P) -> Self
    where
        P: Publisher<T> + 'static,
    {
        Self {
            flux: Flux::from_publisher(publisher),
        }
    }
}

impl<T> Mono<T>
where
    T: Send + 'static,
{
    /// Emits `value`, then completes.
    #[must_use]
    pub fn just(value: T) -> Self {
        Self {
            flux: Flux::just([value]),
        }
    }

    /// Completes without emitting anything.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            flux: Flux::empty(),
        }
    }

    /// Fails immediately with `error`.
    #[must_use]
    pub fn error(error: Error) -> Self {
        Self {
            flux: Flux::error(error),
        }
    }

    /// Emits the first item of `flux` and cancels the rest. Completes empty if `flux` does.
    #[must_use]
    pub fn from_flux(flux: Flux<T>) -> Self {
        Self::from_publisher(First::new(flux))
    }

    /// Transforms the item.
    #[must_use]
    pub fn map<U, F>(self, transform: F) -> Mono<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
    {
        Mono {
            flux: self.flux.map(transform),
        }
    }

    /// Transforms the item with a fallible function.
    #[must_use]
    pub fn try_map<U, F>(self, transform: F) -> Mono<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> Result<U> + Send + 'static,
    {
        Mono {
            flux: self.flux.try_map(transform),
        }
    }

    /// Completes empty if the item does not satisfy `predicate`.
    #[must_use]
    pub fn filter<P>(self, predicate: P) -> Self
    where
        P: FnMut(&T) -> bool + Send + 'static,
    {
        Self {
            flux: self.flux.filter(predicate),
        }
    }

    /// Continues with the `Mono` produced from the item.
    #[must_use]
    pub fn flat_map<U, F>(self, mapper: F) -> Mono<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Mono<U> + Send + 'static,
    {
        let mut mapper = Some(mapper);

        let flux = self.flux.flat_map_with(
            move |item| match mapper.take() {
                Some(mapper) => mapper(item).into_flux(),
                None => Flux::empty(),
            },
            nz!(1),
        );

        Mono { flux }
    }

    /// Calls `hook` with the item before passing it on.
    #[must_use]
    pub fn do_on_next<F>(self, hook: F) -> Self
    where
        F: FnMut(&T) + Send + 'static,
    {
        Self {
            flux: self.flux.do_on_next(hook),
        }
    }

    /// Calls `hook` with the error before passing it on.
    #[must_use]
    pub fn do_on_error<F>(self, hook: F) -> Self
    where
        F: FnMut(&Error) + Send + 'static,
    {
        Self {
            flux: self.flux.do_on_error(hook),
        }
    }

    /// Emits `value` if this `Mono` completes empty.
    #[must_use]
    pub fn default_if_empty(self, value: T) -> Self {
        Self {
            flux: self.flux.default_if_empty(value),
        }
    }

    /// Continues with `fallback` if this `Mono` completes empty.
    #[must_use]
    pub fn switch_if_empty(self, fallback: Self) -> Self {
        Self {
            flux: self.flux.switch_if_empty(fallback.flux),
        }
    }

    /// See [`Flux::log()`].
    #[must_use]
    pub fn log(self, category: &str) -> Self
    where
        T: Debug,
    {
        Self {
            flux: self.flux.log(category),
        }
    }

    /// See [`Flux::subscribe_on()`].
    #[must_use]
    pub fn subscribe_on(self, scheduler: Scheduler) -> Self {
        Self {
            flux: self.flux.subscribe_on(scheduler),
        }
    }

    /// The same sequence as a [`Flux`].
    #[must_use]
    pub fn into_flux(self) -> Flux<T> {
        self.flux
    }

    /// See [`Flux::subscribe()`].
    pub fn subscribe<S>(self, subscriber: S)
    where
        S: Subscriber<T> + 'static,
    {
        self.flux.subscribe(subscriber);
    }

    /// See [`Flux::consume()`].
    pub fn consume(self) -> Disposable {
        self.flux.consume()
    }

    /// See [`Flux::for_each()`].
    pub fn for_each<N>(self, on_next: N) -> Disposable
    where
        N: FnMut(T) + Send + 'static,
    {
        self.flux.for_each(on_next)
    }

    /// See [`Flux::for_each_with()`].
    pub fn for_each_with<N, E, C>(self, on_next: N, on_error: E, on_complete: C) -> Disposable
    where
        N: FnMut(T) + Send + 'static,
        E: FnMut(Error) + Send + 'static,
        C: FnMut() + Send + 'static,
    {
        self.flux.for_each_with(on_next, on_error, on_complete)
    }

    /// Subscribes and blocks until the `Mono` terminates.
    ///
    /// Returns the item, or `None` if the `Mono` completed empty.
    ///
    /// # Errors
    ///
    /// Returns the error that terminated the `Mono`.
    pub fn block(self) -> Result<Option<T>> {
        block_last(self.flux)
    }
}

impl<T> IntoFuture for Mono<T>
where
    T: Send + 'static,
{
    type Output = Result<Option<T>>;
    type IntoFuture = MonoFuture<T>;

    /// Subscribes right away and returns a future for the outcome.
    fn into_future(self) -> Self::IntoFuture {
        MonoFuture::new(self.flux)
    }
}

impl<T> Debug for Mono<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mono")
            .field("flux", &self.flux)
            .finish()
    }
}
