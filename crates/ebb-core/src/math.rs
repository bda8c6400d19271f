//! Full-precision fixed-point helpers.
//!
//! Products of two token amounts overflow `u128`, so every
//! multiply-then-divide goes through a 256-bit intermediate and rounds
//! toward zero.

use primitive_types::U256;

/// Compute `a * b / denominator` with a 256-bit intermediate, rounding toward zero.
///
/// Returns `None` if `denominator` is zero or the quotient does not fit in `u128`.
///
/// # Examples
///
/// ```
/// use ebb_core::math::mul_div;
/// assert_eq!(mul_div(700, 3, 4), Some(525));
/// assert_eq!(mul_div(u128::MAX, u128::MAX, u128::MAX), Some(u128::MAX));
/// assert_eq!(mul_div(1, 1, 0), None);
/// ```
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Option<u128> {
    if denominator == 0 {
        return None;
    }
    let quotient = U256::from(a) * U256::from(b) / U256::from(denominator);
    if quotient > U256::from(u128::MAX) {
        return None;
    }
    Some(quotient.low_u128())
}

/// Amount-weighted average of two timestamps, rounding toward zero.
///
/// Used for the effective start of a lock after a top-up or merge: a small
/// deposit only nudges the start forward instead of resetting it.
/// Non-positive weights are treated as zero; if both are zero the later
/// timestamp wins.
///
/// # Examples
///
/// ```
/// use ebb_core::math::weighted_timestamp;
/// assert_eq!(weighted_timestamp(3, 100, 1, 200), 125);
/// assert_eq!(weighted_timestamp(0, 100, 5, 200), 200);
/// ```
pub fn weighted_timestamp(weight_a: i128, ts_a: u64, weight_b: i128, ts_b: u64) -> u64 {
    let wa = U256::from(weight_a.max(0) as u128);
    let wb = U256::from(weight_b.max(0) as u128);
    let total = wa + wb;
    if total.is_zero() {
        return ts_a.max(ts_b);
    }
    let weighted = (wa * U256::from(ts_a) + wb * U256::from(ts_b)) / total;
    // A weighted mean never exceeds the larger input, so it fits in u64.
    weighted.low_u64()
}
