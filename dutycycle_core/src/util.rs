//! Common time helpers for dutycycle_core.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Number of microseconds in one millisecond.
pub const MICROS_PER_MS: i64 = 1_000;
/// One duty-cycle tick (a quarter second) in microseconds.
pub const QUARTER_SECOND_US: i64 = 250_000;
/// One duty-cycle tick as a sleep duration.
pub const TICK: Duration = Duration::from_millis(250);

/// Convert milliseconds to microseconds, saturating.
#[inline]
pub fn ms_to_us(ms: u64) -> i64 {
    i64::try_from(ms)
        .unwrap_or(i64::MAX)
        .saturating_mul(MICROS_PER_MS)
}

/// Whole quarter-seconds elapsed from `from_us` to `to_us`; 0 if negative.
#[inline]
pub fn elapsed_ticks(from_us: i64, to_us: i64) -> u32 {
    let ticks = to_us.saturating_sub(from_us) / QUARTER_SECOND_US;
    u32::try_from(ticks.max(0)).unwrap_or(u32::MAX)
}

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// A panicking transmission must not take the scheduler down with it.
#[inline]
pub fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_ticks_floors_and_clamps() {
        assert_eq!(elapsed_ticks(0, 249_999), 0);
        assert_eq!(elapsed_ticks(0, 250_000), 1);
        assert_eq!(elapsed_ticks(1_000_000, 0), 0);
        assert_eq!(elapsed_ticks(0, 10_000_000), 40);
    }

    #[test]
    fn ms_to_us_saturates() {
        assert_eq!(ms_to_us(25_000), 25_000_000);
        assert_eq!(ms_to_us(u64::MAX), i64::MAX);
    }
}
