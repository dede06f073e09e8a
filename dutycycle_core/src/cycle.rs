//! Cycle-length generation and phase recovery after a restart.
//!
//! Both ends of the link derive the gap between two transmissions from the
//! thermostat's address and the message counter, so the sequence of deadlines
//! is fully deterministic. Many thermostats on the same channel end up with
//! different phases without any coordination.

use crate::config::TimingCfg;
use crate::util::QUARTER_SECOND_US;

/// Shortest possible cycle, in quarter-seconds (120 s).
pub const MIN_CYCLE_LENGTH: u32 = 480;
/// Longest possible cycle, in quarter-seconds (183.75 s).
pub const MAX_CYCLE_LENGTH: u32 = MIN_CYCLE_LENGTH + 0xFF;

/// Cycle length in quarter-seconds for `(address, counter)`.
///
/// `((address << 8 | counter) * 1103515245 + 12345) >> 16`, low byte, plus
/// 480. Arithmetic wraps at 32 bits.
#[inline]
pub fn cycle_length(address: u32, counter: u8) -> u32 {
    let seed = (address << 8) | u32::from(counter);
    let h = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345) >> 16;
    (h & 0xFF) + MIN_CYCLE_LENGTH
}

/// Cycle length in microseconds.
#[inline]
pub fn cycle_length_us(address: u32, counter: u8) -> i64 {
    i64::from(cycle_length(address, counter)) * QUARTER_SECOND_US
}

/// Where the scheduler should pick up after (re)start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePoint {
    /// No usable history: anchor the first cycle at the current time.
    Fresh,
    /// Continue from the last elapsed duty-cycle event.
    Resumed {
        last_event_us: i64,
        /// Counter to be used for the next transmission.
        message_counter: u8,
    },
}

/// Reconstruct the scheduler phase from persisted state.
///
/// `counter` is the persisted counter, i.e. the one about to be used next.
/// Events are projected forward one cycle at a time until the following event
/// would lie at least `resume_horizon_us` past `now_us`; the last projected
/// event and the counter at that point are returned.
pub fn resume(
    address: u32,
    last_event_us: i64,
    counter: u8,
    now_us: i64,
    timing: &TimingCfg,
) -> ResumePoint {
    let stored = last_event_us.max(0);
    if now_us.saturating_sub(stored) > timing.resync_threshold_us {
        tracing::debug!(
            gap_ms = now_us.saturating_sub(stored) / 1000,
            "duty cycle out of sync, starting fresh"
        );
        return ResumePoint::Fresh;
    }
    let horizon = now_us.saturating_add(timing.resume_horizon_us);
    if stored >= horizon {
        tracing::warn!(
            stored_us = stored,
            now_us,
            "stored duty cycle event lies in the future, starting fresh"
        );
        return ResumePoint::Fresh;
    }

    let mut counter = counter.wrapping_sub(1);
    let mut last = stored;
    let mut next = stored;
    while next < horizon {
        last = next;
        next = last + cycle_length_us(address, counter) + timing.time_offset_us;
        counter = counter.wrapping_add(1);
    }
    tracing::debug!(last_event_us = last, counter, "resuming duty cycle");
    ResumePoint::Resumed {
        last_event_us: last,
        message_counter: counter,
    }
}
