//! One duty-cycle transmission: sleep up to the deadline in shrinking steps,
//! pick the next valve drive, send one climate packet.

use std::iter;
use std::sync::atomic::Ordering;
use std::time::Instant;

use dutycycle_traits::DutyCyclePacket;

use crate::config::TimingCfg;
use crate::error::{DutyCycleError, map_transport_error};
use crate::peer::PeerShared;
use crate::persistence::Variable;
use crate::util::lock;
use crate::valve::AdjustmentCommand;

/// What a transmission task ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransmissionOutcome {
    Sent {
        target: u32,
        command: AdjustmentCommand,
        valve: u8,
    },
    /// No paired valve drive with sub-peers.
    NoTarget,
    Cancelled,
    Failed(DutyCycleError),
}

/// Sleep until `target_us` in chunks of at most `cap`. False when cancelled.
fn wait_until(shared: &PeerShared, target_us: i64, cap: std::time::Duration) -> bool {
    while shared.clock.now_us() < target_us {
        if shared.cancel.is_cancelled() {
            return false;
        }
        shared.clock.sleep_until_us(target_us, cap);
    }
    !shared.cancel.is_cancelled()
}

/// Run a transmission for `counter` due at `deadline_us`. Never panics on
/// transport or store errors; everything is reported in the outcome.
pub(crate) fn run(shared: &PeerShared, counter: u8, deadline_us: i64) -> TransmissionOutcome {
    let timing = &shared.cfg.timing;
    let leads = timing
        .transmission_leads
        .iter()
        .map(|d| TimingCfg::lead_us(*d))
        .chain(iter::once(0));
    for lead in leads {
        if !wait_until(shared, deadline_us - lead, timing.max_transmission_sleep) {
            tracing::debug!(counter, "transmission cancelled");
            return TransmissionOutcome::Cancelled;
        }
    }

    // Lock order: pairing, then vars.
    let (target, command, valve) = {
        let mut pairing = lock(&shared.pairing);
        let p = &mut *pairing;
        let Some(target) = p.rotation.next(&p.registry) else {
            tracing::debug!(counter, "not sending duty cycle packet, no valve drive paired");
            return TransmissionOutcome::NoTarget;
        };
        let mut vars = lock(&shared.vars);
        // Persisted after the send; a store write here would delay the packet.
        vars.values.rotation_cursor = Some(target);
        let command = vars.values.valve.command(target, &mut p.decalc);
        (target, command, vars.values.valve.pending())
    };

    let packet =
        DutyCyclePacket::climate(counter, shared.address, target, command.as_byte(), valve);
    let started = Instant::now();
    let late_us = shared.clock.now_us() - deadline_us;
    let sent = shared.transport.send(&packet);
    lock(&shared.vars)
        .storage
        .save_logged(Variable::RotationCursor, i64::from(target));
    if let Err(e) = sent {
        let err = map_transport_error(e.as_ref());
        tracing::warn!(
            counter,
            target = format_args!("{target:06X}"),
            error = %err,
            "sending duty cycle packet failed"
        );
        return TransmissionOutcome::Failed(err);
    }
    tracing::debug!(
        counter,
        target = format_args!("{target:06X}"),
        ?command,
        valve,
        late_us,
        took_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "duty cycle packet sent"
    );

    {
        let mut vars = lock(&shared.vars);
        vars.values.valve.commit(valve);
        vars.storage
            .save_logged(Variable::ValveState, i64::from(valve));
    }
    shared.transmissions.fetch_add(1, Ordering::Relaxed);
    TransmissionOutcome::Sent {
        target,
        command,
        valve,
    }
}
