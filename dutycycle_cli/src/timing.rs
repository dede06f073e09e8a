//! `plan` and `resume`: the cycle arithmetic without threads.

use dutycycle_core::scheduler::{PeerSchedule, next_deadline_us};
use dutycycle_core::{ResumePoint, TimingCfg, resume};
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedCycle {
    /// Counter carried by the packet that closes the cycle.
    pub counter: u8,
    /// Quarter-seconds.
    pub cycle_length: u32,
    pub deadline_us: i64,
}

/// The next `count` cycles after an event at `from_us`, with `counter` for
/// the first transmission.
pub fn plan(address: u32, counter: u8, count: u16, from_us: i64, timing: &TimingCfg) -> Vec<PlannedCycle> {
    let start = ResumePoint::Resumed {
        last_event_us: from_us,
        message_counter: counter,
    };
    let mut sched = PeerSchedule::new(address, start, counter, from_us, timing.time_offset_us);
    (0..count)
        .map(|_| {
            let c = PlannedCycle {
                counter: sched.message_counter,
                cycle_length: sched.cycle_length,
                deadline_us: sched.deadline_us(),
            };
            sched.advance();
            c
        })
        .collect()
}

pub fn cycle_line(c: &PlannedCycle, json: bool) -> String {
    let seconds = f64::from(c.cycle_length) / 4.0;
    if json {
        json!({
            "counter": c.counter,
            "cycle_length": c.cycle_length,
            "cycle_s": seconds,
            "deadline_us": c.deadline_us,
        })
        .to_string()
    } else {
        format!(
            "#{:03}  {:>3} ticks  {:>7.2} s  deadline {}",
            c.counter, c.cycle_length, seconds, c.deadline_us
        )
    }
}

pub fn resume_value(
    address: u32,
    last_event_us: i64,
    counter: u8,
    now_us: i64,
    timing: &TimingCfg,
) -> Value {
    match resume(address, last_event_us, counter, now_us, timing) {
        ResumePoint::Fresh => json!({ "mode": "fresh", "now_us": now_us }),
        ResumePoint::Resumed {
            last_event_us,
            message_counter,
        } => json!({
            "mode": "resumed",
            "last_event_us": last_event_us,
            "message_counter": message_counter,
            "next_deadline_us": next_deadline_us(address, last_event_us, message_counter, timing.time_offset_us),
        }),
    }
}

pub fn resume_line(v: &Value) -> String {
    if v["mode"] == "fresh" {
        return "fresh: history too old or in the future, first cycle starts now".to_string();
    }
    format!(
        "resumed: last event {} counter {} next deadline {}",
        v["last_event_us"], v["message_counter"], v["next_deadline_us"]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use dutycycle_core::cycle_length;

    const ADDR: u32 = 0x3F0C8E;

    #[test]
    fn plan_chains_deadlines() {
        let timing = TimingCfg::default();
        let cycles = plan(ADDR, 10, 3, 0, &timing);
        assert_eq!(cycles.len(), 3);
        assert_eq!(cycles[0].counter, 10);
        assert_eq!(cycles[0].cycle_length, cycle_length(ADDR, 9));
        assert_eq!(cycles[1].counter, 11);
        assert_eq!(cycles[1].cycle_length, cycle_length(ADDR, 10));
        assert_eq!(
            cycles[1].deadline_us,
            cycles[0].deadline_us + i64::from(cycles[1].cycle_length) * 250_000 + 3000
        );
    }

    #[test]
    fn plan_counter_wraps() {
        let cycles = plan(ADDR, 255, 2, 0, &TimingCfg::default());
        assert_eq!(cycles[0].counter, 255);
        assert_eq!(cycles[1].counter, 0);
    }

    #[test]
    fn resume_reports_fresh_for_stale_history() {
        let v = resume_value(ADDR, 0, 5, 3_600_000_000, &TimingCfg::default());
        assert_eq!(v["mode"], "fresh");
        assert!(resume_line(&v).starts_with("fresh"));
    }

    #[test]
    fn resume_projects_recent_history() {
        let timing = TimingCfg::default();
        let now = 1_000_000_000_000;
        let v = resume_value(ADDR, now - 7_000_000, 10, now, &timing);
        assert_eq!(v["mode"], "resumed");
        let next = v["next_deadline_us"].as_i64().expect("deadline");
        assert!(next > now - 7_000_000);
    }
}
