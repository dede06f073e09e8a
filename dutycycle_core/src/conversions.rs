//! `From` implementations bridging `dutycycle_config` types to `dutycycle_core` types.

use std::time::Duration;

use crate::config::{DecalcificationCfg, DutyCycleConfig, RtCfg, TimingCfg, VariableIds};
use crate::util::ms_to_us;

// ── TimingCfg ────────────────────────────────────────────────────────────────

impl From<&dutycycle_config::TimingCfg> for TimingCfg {
    fn from(c: &dutycycle_config::TimingCfg) -> Self {
        Self {
            time_offset_us: c.time_offset_us,
            coarse_lead_ticks: c.coarse_lead_ticks,
            fine_lead_ticks: c.fine_lead_ticks,
            precision_leads: c
                .precision_leads_ms
                .iter()
                .map(|&ms| Duration::from_millis(ms))
                .collect(),
            transmission_leads: c
                .transmission_leads_ms
                .iter()
                .map(|&ms| Duration::from_millis(ms))
                .collect(),
            max_transmission_sleep: Duration::from_millis(c.max_transmission_sleep_ms),
            resync_threshold_us: ms_to_us(c.resync_threshold_ms),
            resume_horizon_us: ms_to_us(c.resume_horizon_ms),
        }
    }
}

// ── DecalcificationCfg ───────────────────────────────────────────────────────

fn weekday(w: dutycycle_config::Weekday) -> chrono::Weekday {
    use chrono::Weekday as C;
    use dutycycle_config::Weekday as W;
    match w {
        W::Monday => C::Mon,
        W::Tuesday => C::Tue,
        W::Wednesday => C::Wed,
        W::Thursday => C::Thu,
        W::Friday => C::Fri,
        W::Saturday => C::Sat,
        W::Sunday => C::Sun,
    }
}

impl From<&dutycycle_config::DecalcificationCfg> for DecalcificationCfg {
    fn from(c: &dutycycle_config::DecalcificationCfg) -> Self {
        Self {
            enabled: c.enabled,
            weekday: weekday(c.weekday),
            hour: c.hour,
            start_minute: c.start_minute,
            end_minute: c.end_minute,
        }
    }
}

// ── VariableIds ──────────────────────────────────────────────────────────────

impl From<&dutycycle_config::VariableIdsCfg> for VariableIds {
    fn from(c: &dutycycle_config::VariableIdsCfg) -> Self {
        Self {
            rotation_cursor: c.rotation_cursor,
            valve_state: c.valve_state,
            new_valve_state: c.new_valve_state,
            last_duty_cycle_event: c.last_duty_cycle_event,
            message_counter: c.message_counter,
        }
    }
}

// ── RtCfg ────────────────────────────────────────────────────────────────────

impl From<&dutycycle_config::RtCfg> for RtCfg {
    fn from(c: &dutycycle_config::RtCfg) -> Self {
        Self {
            enabled: c.enabled,
            scheduler_priority: c.scheduler_priority,
            transmission_priority: c.transmission_priority,
        }
    }
}

// ── DutyCycleConfig ──────────────────────────────────────────────────────────

impl From<&dutycycle_config::Config> for DutyCycleConfig {
    fn from(c: &dutycycle_config::Config) -> Self {
        Self {
            timing: (&c.timing).into(),
            decalcification: (&c.decalcification).into(),
            ids: (&c.persistence.ids).into(),
            rt: (&c.rt).into(),
        }
    }
}
