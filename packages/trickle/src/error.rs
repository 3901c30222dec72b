use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can terminate a reactive sequence.
///
/// Errors travel downstream as the `OnError` terminal signal. They are never thrown across
/// the `subscribe` boundary, so the same value may be observed by several parties (a
/// `do_on_error` hook and the final subscriber, for example). This is why the type is
/// cheaply cloneable.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A subscriber asked for zero items. Demand must always be positive.
    #[error("invalid demand: request({requested}) must be positive")]
    InvalidDemand {
        /// The amount that was requested.
        requested: u64,
    },

    /// A source computation or a user-supplied transform failed.
    #[error("upstream failure: {0}")]
    UpstreamFailure(Arc<dyn StdError + Send + Sync>),

    /// A signal arrived that the reactive streams contract does not allow at this point.
    #[error("protocol violation: {0}")]
    ProtocolViolation(Violation),

    /// A timer ticked while the subscriber had no outstanding demand for the tick.
    #[error("could not emit tick {tick} due to lack of requests")]
    Overflow {
        /// Zero-based index of the tick that could not be delivered.
        tick: u64,
    },

    /// Work was handed to a scheduler that has already been shut down.
    #[error("scheduler has been shut down and rejected the task")]
    Rejected,

    /// The sequence was dropped before it produced a terminal signal, for example because the
    /// scheduler it was queued on shut down first.
    #[error("sequence was abandoned before producing a terminal signal")]
    Abandoned,
}

impl Error {
    /// Wraps an arbitrary error as an [`Error::UpstreamFailure`].
    pub fn upstream<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::UpstreamFailure(Arc::new(error))
    }

    /// Creates an [`Error::UpstreamFailure`] from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::UpstreamFailure(Arc::new(Message(message.into())))
    }

    /// Whether this is an [`Error::UpstreamFailure`].
    #[must_use]
    pub fn is_upstream_failure(&self) -> bool {
        matches!(self, Self::UpstreamFailure(_))
    }
}

/// The specific way in which a publisher broke the signal contract.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Violation {
    /// `on_next`, `on_error` or `on_complete` was called before `on_subscribe`.
    SignalBeforeSubscribe,

    /// `on_subscribe` was called more than once.
    DuplicateSubscribe,

    /// A signal arrived after `on_complete` or `on_error`.
    SignalAfterTerminal,

    /// More items arrived than the subscriber had requested.
    DemandExceeded,
}

impl fmt::Display for Violation {
    #[cfg_attr(test, mutants::skip)] // No API contract for error message.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::SignalBeforeSubscribe => "signal received before onSubscribe",
            Self::DuplicateSubscribe => "onSubscribe received more than once",
            Self::SignalAfterTerminal => "signal received after a terminal signal",
            Self::DemandExceeded => "more items received than were requested",
        };

        f.write_str(text)
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    #[cfg_attr(test, mutants::skip)] // No API contract for error message.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Message {}

/// A specialized `Result` type for trickle operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;
