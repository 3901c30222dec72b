use std::fmt;

use crate::{Error, SubscriptionHandle};

/// One signal travelling from a publisher to a subscriber.
///
/// Exactly one `OnSubscribe` precedes any `OnNext`, and exactly one terminal signal
/// (`OnError` or `OnComplete`) ends a sequence that was not cancelled. Nothing follows a
/// terminal signal.
#[non_exhaustive]
pub enum Signal<T> {
    /// The subscription handle has been delivered.
    OnSubscribe(SubscriptionHandle),

    /// An item.
    OnNext(T),

    /// The sequence failed.
    OnError(Error),

    /// The sequence finished successfully.
    OnComplete,
}

impl<T> Signal<T> {
    /// Name of the signal as it appears in logs, e.g. `"onNext"`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::OnSubscribe(_) => "onSubscribe",
            Self::OnNext(_) => "onNext",
            Self::OnError(_) => "onError",
            Self::OnComplete => "onComplete",
        }
    }

    /// Whether this signal ends the sequence.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::OnError(_) | Self::OnComplete)
    }
}

impl<T> fmt::Debug for Signal<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnSubscribe(_) => f.write_str("onSubscribe()"),
            Self::OnNext(item) => write!(f, "onNext({item:?})"),
            Self::OnError(error) => write!(f, "onError({error})"),
            Self::OnComplete => f.write_str("onComplete()"),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn terminal_signals_are_terminal() {
        assert!(Signal::<i32>::OnComplete.is_terminal());
        assert!(Signal::<i32>::OnError(Error::Rejected).is_terminal());
        assert!(!Signal::OnNext(1).is_terminal());
    }

    #[test]
    fn debug_matches_log_format() {
        assert_eq!(format!("{:?}", Signal::OnNext(42)), "onNext(42)");
        assert_eq!(format!("{:?}", Signal::<u8>::OnComplete), "onComplete()");
        assert_eq!(Signal::OnNext("x").name(), "onNext");
    }
}
