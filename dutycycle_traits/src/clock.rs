use chrono::{DateTime, Local, NaiveDateTime};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Epoch-referenced monotonic clock used for duty-cycle timing.
///
/// - now_us(): microseconds since the Unix epoch; never goes backwards
/// - sleep(): sleeps for the provided duration (implementations may simulate)
/// - sleep_until_us(): absolute-time sleep recomputed against `now_us()`
pub trait Clock {
    fn now_us(&self) -> i64;
    fn sleep(&self, d: Duration);

    /// Sleep until `target_us`, but never longer than `cap`.
    ///
    /// Returns the duration actually requested; zero when the target has
    /// already passed.
    fn sleep_until_us(&self, target_us: i64, cap: Duration) -> Duration {
        let remaining = target_us.saturating_sub(self.now_us());
        if remaining <= 0 {
            return Duration::ZERO;
        }
        let d = Duration::from_micros(remaining.unsigned_abs()).min(cap);
        self.sleep(d);
        d
    }

    /// Local wall-clock time matching `now_us()`.
    fn local_time(&self) -> Option<NaiveDateTime> {
        DateTime::from_timestamp_micros(self.now_us())
            .map(|utc| utc.with_timezone(&Local).naive_local())
    }
}

fn system_now_us() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_micros()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

fn micros_i64(d: Duration) -> i64 {
    i64::try_from(d.as_micros()).unwrap_or(i64::MAX)
}

/// Default clock: wall-clock epoch captured once, advanced by `Instant`.
///
/// Wall-clock steps (NTP, manual changes) after construction do not move it.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    anchor_us: i64,
    anchor: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
            anchor_us: system_now_us(),
        }
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now_us(&self) -> i64 {
        self.anchor_us
            .saturating_add(micros_i64(self.anchor.elapsed()))
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_clock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Deterministic test clock whose time can be advanced manually.
    ///
    /// now_us() = origin + offset
    /// sleep(d) advances internal time by d without actually sleeping.
    #[derive(Debug, Clone)]
    pub struct TestClock {
        origin_us: i64,
        offset: Arc<Mutex<Duration>>,
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestClock {
        pub fn new() -> Self {
            Self::starting_at(system_now_us())
        }

        pub fn starting_at(origin_us: i64) -> Self {
            Self {
                origin_us,
                offset: Arc::new(Mutex::new(Duration::ZERO)),
            }
        }

        /// Advance the clock by the given duration.
        pub fn advance(&self, d: Duration) {
            if let Ok(mut off) = self.offset.lock() {
                *off = off.saturating_add(d);
            }
        }

        /// Set the absolute offset relative to origin.
        pub fn set_offset(&self, d: Duration) {
            if let Ok(mut off) = self.offset.lock() {
                *off = d;
            }
        }
    }

    impl Clock for TestClock {
        fn now_us(&self) -> i64 {
            let off = self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO);
            self.origin_us.saturating_add(micros_i64(off))
        }

        fn sleep(&self, d: Duration) {
            self.advance(d);
        }
    }

    /// Real-time clock running `factor` times faster than the wall clock.
    ///
    /// Shared safely between threads; a 2-minute duty cycle at factor 1000
    /// takes about 120 ms of real time.
    #[derive(Debug, Clone, Copy)]
    pub struct AcceleratedClock {
        base: MonotonicClock,
        factor: u32,
    }

    impl AcceleratedClock {
        pub fn new(factor: u32) -> Self {
            Self {
                base: MonotonicClock::new(),
                factor: factor.max(1),
            }
        }

        /// Accelerated clock whose `now_us()` begins at `origin_us`.
        pub fn starting_at(origin_us: i64, factor: u32) -> Self {
            Self {
                base: MonotonicClock {
                    anchor_us: origin_us,
                    anchor: Instant::now(),
                },
                factor: factor.max(1),
            }
        }
    }

    impl Clock for AcceleratedClock {
        fn now_us(&self) -> i64 {
            let elapsed = micros_i64(self.base.anchor.elapsed());
            self.base
                .anchor_us
                .saturating_add(elapsed.saturating_mul(i64::from(self.factor)))
        }

        fn sleep(&self, d: Duration) {
            thread::sleep(d / self.factor);
        }
    }
}
