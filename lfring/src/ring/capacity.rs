//! Capacity normalization.
//!
//! Rounding to a power of two turns `seq % capacity` into `seq & mask`.

/// Round `n` up to the nearest power of two.
///
/// Smears the highest set bit of `n - 1` into every lower bit, then adds one.
/// `0` maps to `0`, and any `n > 2^63` wraps to `0`; callers treat `0` as an
/// invalid capacity.
///
/// ```
/// use lfring::find_power_of_two;
///
/// assert_eq!(find_power_of_two(10), 16);
/// assert_eq!(find_power_of_two(16), 16);
/// assert_eq!(find_power_of_two(0), 0);
/// assert_eq!(find_power_of_two(u64::MAX), 0);
/// ```
pub const fn find_power_of_two(n: u64) -> u64 {
    let mut n = n.wrapping_sub(1);
    n |= n >> 1;
    n |= n >> 2;
    n |= n >> 4;
    n |= n >> 8;
    n |= n >> 16;
    n |= n >> 32;
    n.wrapping_add(1)
}
