//! Operators: publishers that subscribe to another publisher and transform its signals.
//!
//! Each operator subscribes upstream with its own subscriber and hands downstream a
//! subscription that forwards `request`/`cancel` upstream, adjusted where the operator changes
//! the item count (`filter` re-requests, `take` caps, `flat_map` and `zip` prefetch).

mod collect;
mod flat_map;
mod log;
mod map;
mod peek;
mod subscribe_on;
mod switch_if_empty;
mod take;
mod zip;

pub(crate) use collect::*;
pub(crate) use flat_map::*;
pub(crate) use log::*;
pub(crate) use map::*;
pub(crate) use peek::*;
pub(crate) use subscribe_on::*;
pub(crate) use switch_if_empty::*;
pub(crate) use take::*;
pub(crate) use zip::*;
