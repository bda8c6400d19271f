//! Week-aligned epoch boundaries (Unix-epoch aligned).
//!
//! Lock expiries, slope-change keys and reward buckets all live on these
//! boundaries.

use crate::constants::WEEK;

/// Start of the week containing `t`.
///
/// # Examples
///
/// ```
/// use ebb_core::time::epoch_start;
/// use ebb_core::constants::WEEK;
/// assert_eq!(epoch_start(WEEK * 3 + 17), WEEK * 3);
/// assert_eq!(epoch_start(WEEK * 3), WEEK * 3);
/// ```
pub fn epoch_start(t: u64) -> u64 {
    t - t % WEEK
}

/// The first week boundary strictly after `t`.
///
/// # Examples
///
/// ```
/// use ebb_core::time::next_epoch_boundary;
/// use ebb_core::constants::WEEK;
/// assert_eq!(next_epoch_boundary(WEEK * 3), WEEK * 4);
/// assert_eq!(next_epoch_boundary(WEEK * 3 + 1), WEEK * 4);
/// ```
pub fn next_epoch_boundary(t: u64) -> u64 {
    epoch_start(t).saturating_add(WEEK)
}

/// Unlock time for a lock of `duration` seconds requested at `now`,
/// rounded down to a week boundary.
pub fn unlock_time(now: u64, duration: u64) -> u64 {
    epoch_start(now.saturating_add(duration))
}
