//! Observable peer state.

use std::sync::atomic::{AtomicU8, Ordering};

/// Where the scheduler thread currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedulerPhase {
    /// Not started yet.
    Idle = 0,
    Initializing = 1,
    /// Ticking until the coarse lead before the deadline.
    CoarseWait = 2,
    /// Ticking until the fine lead before the deadline.
    FineWait = 3,
    /// Absolute-time sleeps close to the deadline.
    PrecisionLead = 4,
    /// Handing the cycle to a transmission task.
    Transmitting = 5,
    Stopped = 6,
}

impl SchedulerPhase {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Initializing,
            2 => Self::CoarseWait,
            3 => Self::FineWait,
            4 => Self::PrecisionLead,
            5 => Self::Transmitting,
            6 => Self::Stopped,
            _ => Self::Idle,
        }
    }
}

/// Lock-free cell holding a [`SchedulerPhase`].
#[derive(Debug, Default)]
pub struct PhaseCell(AtomicU8);

impl PhaseCell {
    pub fn get(&self) -> SchedulerPhase {
        SchedulerPhase::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, phase: SchedulerPhase) {
        self.0.store(phase as u8, Ordering::Release);
    }
}

/// Snapshot returned by `ThermostatPeer::status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerStatus {
    pub address: u32,
    pub phase: SchedulerPhase,
    pub message_counter: u8,
    pub last_duty_cycle_event: i64,
    /// Deadline of the cycle in progress, once an event exists.
    pub next_duty_cycle_event: Option<i64>,
    pub valve_current: u8,
    pub valve_pending: u8,
    pub rotation_cursor: Option<u32>,
    pub valve_drives: usize,
    pub transmissions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_cell_round_trips_every_phase() {
        let cell = PhaseCell::default();
        assert_eq!(cell.get(), SchedulerPhase::Idle);
        for p in [
            SchedulerPhase::Initializing,
            SchedulerPhase::CoarseWait,
            SchedulerPhase::FineWait,
            SchedulerPhase::PrecisionLead,
            SchedulerPhase::Transmitting,
            SchedulerPhase::Stopped,
        ] {
            cell.set(p);
            assert_eq!(cell.get(), p);
        }
    }
}
