//! Scheduler thread: keeps the peer on its duty-cycle grid and hands every
//! deadline to a short-lived transmission thread.
//!
//! Waiting is tiered. Quarter-second ticks cover the bulk of a cycle and keep
//! cancellation responsive; absolute-time sleeps close to the deadline
//! correct the drift the ticks accumulated. The transmission thread then does
//! the last second on its own so the scheduler can already join it on the
//! next cycle.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::TimingCfg;
use crate::cycle::{ResumePoint, cycle_length, cycle_length_us};
use crate::decalc::DecalcificationScheduler;
use crate::error::DutyCycleError;
use crate::peer::PeerShared;
use crate::persistence::Variable;
use crate::rt::apply_thread_priority;
use crate::status::SchedulerPhase;
use crate::transmission::{self, TransmissionOutcome};
use crate::util::{TICK, elapsed_ticks, lock};

/// Timing state owned by the scheduler thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerSchedule {
    pub address: u32,
    /// Counter of the next transmission.
    pub message_counter: u8,
    pub last_duty_cycle_event: i64,
    /// Quarter-seconds elapsed in the current cycle.
    pub duty_cycle_tick: u32,
    /// Length of the current cycle in quarter-seconds.
    pub cycle_length: u32,
    pub time_offset_us: i64,
}

impl PeerSchedule {
    /// Initial state for `start`. `counter` is used when starting fresh.
    pub fn new(
        address: u32,
        start: ResumePoint,
        counter: u8,
        now_us: i64,
        time_offset_us: i64,
    ) -> Self {
        let (last, counter) = match start {
            ResumePoint::Fresh => (now_us, counter),
            ResumePoint::Resumed {
                last_event_us,
                message_counter,
            } => (last_event_us, message_counter),
        };
        Self {
            address,
            message_counter: counter,
            last_duty_cycle_event: last,
            duty_cycle_tick: elapsed_ticks(last, now_us),
            cycle_length: cycle_length(address, counter.wrapping_sub(1)),
            time_offset_us,
        }
    }

    /// Absolute time of the transmission closing the current cycle.
    pub fn deadline_us(&self) -> i64 {
        self.last_duty_cycle_event
            + i64::from(self.cycle_length) * crate::util::QUARTER_SECOND_US
            + self.time_offset_us
    }

    /// Move to the next cycle after the transmission for the current one.
    pub fn advance(&mut self) {
        self.last_duty_cycle_event = self.deadline_us();
        self.cycle_length = cycle_length(self.address, self.message_counter);
        self.message_counter = self.message_counter.wrapping_add(1);
        self.duty_cycle_tick = 0;
    }
}

/// Deadline of the cycle following an event at `last_us` with the next
/// transmission using `counter`.
pub fn next_deadline_us(address: u32, last_us: i64, counter: u8, time_offset_us: i64) -> i64 {
    last_us + cycle_length_us(address, counter.wrapping_sub(1)) + time_offset_us
}

enum Flow {
    Continue,
    Stop,
}

/// Spawn the scheduler thread for `shared`.
pub(crate) fn spawn(shared: Arc<PeerShared>, start: ResumePoint) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("dutycycle-{:06x}", shared.address))
        .spawn(move || run(&shared, start))
}

fn run(shared: &Arc<PeerShared>, start: ResumePoint) {
    let rt = &shared.cfg.rt;
    apply_thread_priority(rt.enabled, rt.scheduler_priority, "scheduler");
    shared.phase.set(SchedulerPhase::Initializing);

    let mut sched = {
        let mut vars = lock(&shared.vars);
        let sched = PeerSchedule::new(
            shared.address,
            start,
            vars.values.message_counter,
            shared.clock.now_us(),
            shared.cfg.timing.time_offset_us,
        );
        vars.values.last_duty_cycle_event = sched.last_duty_cycle_event;
        vars.values.message_counter = sched.message_counter;
        vars.storage
            .save_logged(Variable::LastDutyCycleEvent, sched.last_duty_cycle_event);
        vars.storage
            .save_logged(Variable::MessageCounter, i64::from(sched.message_counter));
        sched
    };
    tracing::info!(
        address = format_args!("{:06X}", shared.address),
        ?start,
        counter = sched.message_counter,
        cycle_length = sched.cycle_length,
        tick = sched.duty_cycle_tick,
        "duty cycle started"
    );

    let decalc = DecalcificationScheduler::new(shared.cfg.decalcification.clone());
    let mut inflight: Option<JoinHandle<TransmissionOutcome>> = None;
    while !shared.cancel.is_cancelled() {
        match run_cycle(shared, &mut sched, &decalc, &mut inflight) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Stop) => break,
            Err(e) => tracing::error!(error = %e, "duty cycle iteration failed"),
        }
    }

    join_transmission(&mut inflight);
    shared.phase.set(SchedulerPhase::Stopped);
    tracing::info!(address = format_args!("{:06X}", shared.address), "duty cycle stopped");
}

/// Tick until `sched.duty_cycle_tick` reaches `until`. False when cancelled.
fn tick_until(shared: &PeerShared, sched: &mut PeerSchedule, until: u32) -> bool {
    while sched.duty_cycle_tick < until {
        if shared.cancel.is_cancelled() {
            return false;
        }
        shared.clock.sleep(TICK);
        sched.duty_cycle_tick += 1;
    }
    !shared.cancel.is_cancelled()
}

fn run_cycle(
    shared: &Arc<PeerShared>,
    sched: &mut PeerSchedule,
    decalc: &DecalcificationScheduler,
    inflight: &mut Option<JoinHandle<TransmissionOutcome>>,
) -> Result<Flow, DutyCycleError> {
    let timing = &shared.cfg.timing;
    let deadline = sched.deadline_us();

    shared.phase.set(SchedulerPhase::CoarseWait);
    let coarse_end = sched.cycle_length.saturating_sub(timing.coarse_lead_ticks);
    if !tick_until(shared, sched, coarse_end) {
        return Ok(Flow::Stop);
    }
    shared.phase.set(SchedulerPhase::FineWait);
    let fine_end = sched.cycle_length.saturating_sub(timing.fine_lead_ticks);
    if !tick_until(shared, sched, fine_end) {
        return Ok(Flow::Stop);
    }

    {
        let mut pairing = lock(&shared.pairing);
        let p = &mut *pairing;
        decalc.check(shared.clock.local_time(), p.registry.addresses(), &mut p.decalc);
    }

    shared.phase.set(SchedulerPhase::PrecisionLead);
    let remaining = deadline - shared.clock.now_us();
    if remaining > TimingCfg::lead_us(timing.max_precision_sleep()) {
        tracing::warn!(remaining_us = remaining, "deadline further away than expected");
    }
    for lead in &timing.precision_leads {
        let target = deadline - TimingCfg::lead_us(*lead);
        while shared.clock.now_us() < target {
            if shared.cancel.is_cancelled() {
                return Ok(Flow::Stop);
            }
            shared.clock.sleep_until_us(target, timing.max_transmission_sleep);
        }
        if shared.cancel.is_cancelled() {
            return Ok(Flow::Stop);
        }
    }

    shared.phase.set(SchedulerPhase::Transmitting);
    join_transmission(inflight);
    let spawned = spawn_transmission(shared, sched.message_counter, deadline);

    sched.advance();
    {
        let mut vars = lock(&shared.vars);
        vars.values.last_duty_cycle_event = sched.last_duty_cycle_event;
        vars.values.message_counter = sched.message_counter;
        vars.storage
            .save_logged(Variable::LastDutyCycleEvent, sched.last_duty_cycle_event);
        vars.storage
            .save_logged(Variable::MessageCounter, i64::from(sched.message_counter));
    }
    tracing::debug!(
        counter = sched.message_counter,
        cycle_length = sched.cycle_length,
        next_deadline_us = sched.deadline_us(),
        "next duty cycle"
    );

    *inflight = Some(spawned?);
    Ok(Flow::Continue)
}

fn spawn_transmission(
    shared: &Arc<PeerShared>,
    counter: u8,
    deadline: i64,
) -> Result<JoinHandle<TransmissionOutcome>, DutyCycleError> {
    let task = Arc::clone(shared);
    thread::Builder::new()
        .name(format!("dutycycle-tx-{:06x}", shared.address))
        .spawn(move || {
            let rt = &task.cfg.rt;
            apply_thread_priority(rt.enabled, rt.transmission_priority, "transmission");
            transmission::run(&task, counter, deadline)
        })
        .map_err(|e| DutyCycleError::Thread(format!("spawning transmission thread: {e}")))
}

fn join_transmission(inflight: &mut Option<JoinHandle<TransmissionOutcome>>) {
    if let Some(handle) = inflight.take() {
        match handle.join() {
            Ok(outcome) => tracing::trace!(?outcome, "transmission joined"),
            Err(e) => tracing::warn!(?e, "transmission thread panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: u32 = 0x3F0C8E;

    #[test]
    fn fresh_start_anchors_at_now() {
        let now = 1_700_000_000_000_000;
        let s = PeerSchedule::new(ADDR, ResumePoint::Fresh, 5, now, 3000);
        assert_eq!(s.last_duty_cycle_event, now);
        assert_eq!(s.message_counter, 5);
        assert_eq!(s.duty_cycle_tick, 0);
        assert_eq!(s.cycle_length, cycle_length(ADDR, 4));
        assert_eq!(s.deadline_us(), next_deadline_us(ADDR, now, 5, 3000));
    }

    #[test]
    fn resumed_start_counts_elapsed_ticks() {
        let now = 1_700_000_000_000_000;
        let start = ResumePoint::Resumed {
            last_event_us: now - 10_100_000,
            message_counter: 10,
        };
        let s = PeerSchedule::new(ADDR, start, 0, now, 3000);
        assert_eq!(s.duty_cycle_tick, 40);
        assert_eq!(s.message_counter, 10);
        assert_eq!(s.cycle_length, cycle_length(ADDR, 9));
    }

    #[test]
    fn advance_moves_to_next_cycle() {
        let mut s = PeerSchedule::new(ADDR, ResumePoint::Fresh, 255, 0, 3000);
        s.duty_cycle_tick = 400;
        let deadline = s.deadline_us();
        s.advance();
        assert_eq!(s.last_duty_cycle_event, deadline);
        assert_eq!(s.cycle_length, cycle_length(ADDR, 255));
        assert_eq!(s.message_counter, 0);
        assert_eq!(s.duty_cycle_tick, 0);
        assert_eq!((s.deadline_us() - deadline - 3000) % 250_000, 0);
    }
}
