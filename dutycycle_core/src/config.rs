//! Configuration types for the duty-cycle engine.
//!
//! These are the runtime configuration structs used by the scheduler and the
//! transmission task. They are separate from the TOML-deserialized config in
//! `dutycycle_config`; defaults are the protocol's constants.

use std::time::Duration;

use crate::util::{QUARTER_SECOND_US, ms_to_us};

/// Cycle timing.
#[derive(Debug, Clone)]
pub struct TimingCfg {
    /// Added to every cycle; without it a fraction of packets leave early.
    pub time_offset_us: i64,
    /// Coarse wait stops this many ticks before the end of the cycle.
    pub coarse_lead_ticks: u32,
    /// Fine wait stops this many ticks before the end of the cycle.
    pub fine_lead_ticks: u32,
    /// Scheduler corrective sleeps, as leads before the deadline (decreasing).
    pub precision_leads: Vec<Duration>,
    /// Transmission corrective sleeps, as leads before the deadline (decreasing).
    /// A final sleep to the deadline itself is always appended.
    pub transmission_leads: Vec<Duration>,
    /// Cap for each transmission-side sleep.
    pub max_transmission_sleep: Duration,
    /// Persisted state older than this is resynchronised from scratch.
    pub resync_threshold_us: i64,
    /// Resume stops projecting once the next event is this far ahead.
    pub resume_horizon_us: i64,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            time_offset_us: 3000,
            coarse_lead_ticks: 80,
            fine_lead_ticks: 40,
            precision_leads: vec![Duration::from_secs(5), Duration::from_secs(2)],
            transmission_leads: vec![
                Duration::from_millis(1000),
                Duration::from_millis(500),
                Duration::from_millis(100),
                Duration::from_millis(30),
            ],
            max_transmission_sleep: Duration::from_secs(1),
            resync_threshold_us: 1_800_000_000,
            resume_horizon_us: 25_000_000,
        }
    }
}

impl TimingCfg {
    /// Longest single precision-lead sleep the scheduler will issue.
    ///
    /// Covers the fine-wait window plus a resumed event lying up to the
    /// resume horizon in the future.
    pub fn max_precision_sleep(&self) -> Duration {
        let fine_us = i64::from(self.fine_lead_ticks).saturating_mul(QUARTER_SECOND_US);
        let total = fine_us.saturating_add(self.resume_horizon_us).max(0);
        Duration::from_micros(total.unsigned_abs())
    }

    pub(crate) fn lead_us(d: Duration) -> i64 {
        ms_to_us(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Weekly decalcification window (local time).
#[derive(Debug, Clone)]
pub struct DecalcificationCfg {
    pub enabled: bool,
    pub weekday: chrono::Weekday,
    pub hour: u32,
    pub start_minute: u32,
    pub end_minute: u32,
}

impl Default for DecalcificationCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            weekday: chrono::Weekday::Sat,
            hour: 14,
            start_minute: 0,
            end_minute: 3,
        }
    }
}

/// Keys of the persisted peer variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableIds {
    pub rotation_cursor: u32,
    pub valve_state: u32,
    pub new_valve_state: u32,
    pub last_duty_cycle_event: u32,
    pub message_counter: u32,
}

impl Default for VariableIds {
    fn default() -> Self {
        Self {
            rotation_cursor: 1000,
            valve_state: 1004,
            new_valve_state: 1005,
            last_duty_cycle_event: 1006,
            message_counter: 1007,
        }
    }
}

/// Thread priority requests (SCHED_FIFO, honoured with the `rt` feature).
#[derive(Debug, Clone)]
pub struct RtCfg {
    pub enabled: bool,
    pub scheduler_priority: i32,
    pub transmission_priority: i32,
}

impl Default for RtCfg {
    fn default() -> Self {
        Self {
            enabled: false,
            scheduler_priority: 35,
            transmission_priority: 99,
        }
    }
}

/// Everything a peer needs besides its collaborators.
#[derive(Debug, Clone, Default)]
pub struct DutyCycleConfig {
    pub timing: TimingCfg,
    pub decalcification: DecalcificationCfg,
    pub ids: VariableIds,
    pub rt: RtCfg,
}
