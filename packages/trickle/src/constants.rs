use std::num::NonZero;

use new_zealand::nz;

/// Demand value that means "no limit". Requesting it switches a subscription into
/// unbounded mode, after which emission no longer decrements the outstanding count.
pub const UNBOUNDED: u64 = u64::MAX;

/// How many inner sequences `flat_map` keeps subscribed at the same time unless
/// configured otherwise via [`Flux::flat_map_with`][crate::Flux::flat_map_with].
pub const DEFAULT_MAX_CONCURRENCY: NonZero<usize> = nz!(256);

/// How many items `flat_map` requests up front from each inner sequence.
pub(crate) const DEFAULT_INNER_PREFETCH: u64 = 32;

/// How many items `zip` requests ahead from each of its sources.
pub(crate) const DEFAULT_ZIP_PREFETCH: u64 = 32;

/// How many items a blocking iterator buffers before it stops requesting more.
pub const DEFAULT_BLOCKING_PREFETCH: NonZero<u64> = nz!(256);

pub(crate) const DEFAULT_THREAD_NAME_PREFIX: &str = "trickle";
