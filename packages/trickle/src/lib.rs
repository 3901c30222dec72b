#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Reactive streams with pull-based backpressure.
//!
//! A [`Flux`] is a sequence of zero or more items, a [`Mono`] a sequence of at most one. Both
//! are recipes: composing operators onto them only describes a pipeline, and nothing runs until
//! a [`Subscriber`] subscribes. The subscriber then pulls items by requesting them through its
//! [`Subscription`], and no stage of the pipeline ever emits more than was asked of it.
//!
//! # Quick start
//!
//! ```rust
//! use trickle::{Flux, TestSubscriber};
//!
//! let probe = TestSubscriber::with_initial_request(2);
//!
//! Flux::range(1, 10)
//!     .filter(|x| x % 3 == 0)
//!     .map(|x| x * 100)
//!     .subscribe(probe.clone());
//!
//! // Only what was requested has been produced so far.
//! assert_eq!(probe.items(), vec![300, 600]);
//!
//! probe.request(5);
//! assert_eq!(probe.items(), vec![300, 600, 900]);
//! assert!(probe.is_completed());
//! ```
//!
//! # Signals
//!
//! Every subscription delivers exactly one `on_subscribe`, then at most as many `on_next` as
//! were requested, then at most one of `on_error` or `on_complete`. A cancelled sequence stops
//! without a terminal signal. Subscribers passed to [`Flux::subscribe()`] are guarded: a
//! publisher that breaks these rules fails the sequence with [`Error::ProtocolViolation`]
//! instead of reaching the subscriber with an illegal signal.
//!
//! Errors are values, not panics: a failing transform (see [`Flux::try_map()`]) cancels its
//! upstream and sends [`Error::UpstreamFailure`] downstream. Only a lambda subscription without
//! an error callback turns an error into a panic, as there is nowhere else to put it.
//!
//! # Threads
//!
//! By default everything runs on the thread that calls `subscribe()` or `request()`. Work moves
//! to other threads only when asked to:
//!
//! * [`Flux::subscribe_on()`] subscribes on a worker of a [`Pool`], via its [`Scheduler`].
//! * [`Flux::interval()`] ticks on a timer thread of its own.
//!
//! Signals of one subscription are never delivered concurrently, whichever threads they come
//! from.
//!
//! # Logging
//!
//! The crate logs through `tracing`. Worker and timer threads log their lifecycle at `debug`
//! level, caught panics at `error` level, and [`Flux::log()`] emits every signal passing
//! through it at `info` level.

mod blocking;
mod conformance;
mod constants;
mod demand;
mod emitter;
mod error;
mod flux;
mod interval;
mod mono;
mod ops;
mod pool;
mod publisher;
mod scheduler;
mod signal;
mod sources;
mod subscriber;
mod subscription;
mod test_subscriber;
mod worker;

pub use blocking::*;
pub use conformance::*;
pub use constants::*;
pub(crate) use demand::*;
pub(crate) use emitter::*;
pub use error::*;
pub use flux::*;
pub(crate) use interval::*;
pub use mono::*;
pub(crate) use ops::*;
pub use pool::*;
pub use publisher::*;
pub use scheduler::*;
pub use signal::*;
pub(crate) use sources::*;
pub use subscriber::*;
pub use subscription::*;
pub use test_subscriber::*;
pub(crate) use worker::*;
