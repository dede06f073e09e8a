//! `ThermostatPeer`: a virtual wall thermostat driving paired valve drives on
//! the duty-cycle grid.
//!
//! Owns the scheduler thread. Everything the threads touch lives in
//! [`PeerShared`] behind two mutexes, always taken in the order
//! `pairing` then `vars`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use dutycycle_traits::{Clock, Transport, VariableStore};

use crate::cancel::CancelToken;
use crate::config::DutyCycleConfig;
use crate::cycle::{ResumePoint, resume};
use crate::decalc::DecalcificationFlags;
use crate::error::{DutyCycleError, Result};
use crate::persistence::{PersistedVariables, Variable, VariableStorage};
use crate::rotation::{DeviceRotation, PairedDeviceRegistry};
use crate::scheduler::{self, next_deadline_us};
use crate::status::{PeerStatus, PhaseCell, SchedulerPhase};
use crate::util::lock;
use crate::valve::ValveStateEncoder;

/// Paired valve drives, rotation cursor and decalcification flags.
#[derive(Debug, Default)]
pub(crate) struct Pairing {
    pub(crate) registry: PairedDeviceRegistry,
    pub(crate) rotation: DeviceRotation,
    pub(crate) decalc: DecalcificationFlags,
}

/// The store and the values it mirrors.
#[derive(Debug)]
pub(crate) struct Vars {
    pub(crate) storage: VariableStorage,
    pub(crate) values: PersistedVariables,
}

/// State shared by the facade, the scheduler thread and transmission tasks.
pub(crate) struct PeerShared {
    pub(crate) address: u32,
    pub(crate) clock: Box<dyn Clock + Send + Sync>,
    pub(crate) transport: Box<dyn Transport + Send + Sync>,
    pub(crate) cfg: DutyCycleConfig,
    pub(crate) pairing: Mutex<Pairing>,
    pub(crate) vars: Mutex<Vars>,
    pub(crate) cancel: CancelToken,
    pub(crate) phase: PhaseCell,
    pub(crate) transmissions: AtomicU64,
}

impl PeerShared {
    pub(crate) fn new(
        address: u32,
        clock: Box<dyn Clock + Send + Sync>,
        transport: Box<dyn Transport + Send + Sync>,
        store: Box<dyn VariableStore + Send>,
        cfg: DutyCycleConfig,
    ) -> Self {
        let storage = VariableStorage::new(store, cfg.ids);
        Self {
            address,
            clock,
            transport,
            cfg,
            pairing: Mutex::new(Pairing::default()),
            vars: Mutex::new(Vars {
                storage,
                values: PersistedVariables::default(),
            }),
            cancel: CancelToken::new(),
            phase: PhaseCell::default(),
            transmissions: AtomicU64::new(0),
        }
    }
}

pub struct ThermostatPeer {
    shared: Arc<PeerShared>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl std::fmt::Debug for ThermostatPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThermostatPeer")
            .field("address", &format_args!("{:06X}", self.shared.address))
            .field("phase", &self.shared.phase.get())
            .finish_non_exhaustive()
    }
}

impl ThermostatPeer {
    /// Peer with no history; the first cycle starts now.
    pub fn create(
        address: u32,
        clock: impl Clock + Send + Sync + 'static,
        transport: impl Transport + Send + Sync + 'static,
        store: impl VariableStore + Send + 'static,
        cfg: DutyCycleConfig,
    ) -> Result<Self> {
        let peer = Self::unstarted(
            PeerShared::new(address, Box::new(clock), Box::new(transport), Box::new(store), cfg),
            false,
        );
        peer.start_duty_cycle(ResumePoint::Fresh)?;
        Ok(peer)
    }

    /// Peer continuing from the variables in `store`.
    pub fn restore(
        address: u32,
        clock: impl Clock + Send + Sync + 'static,
        transport: impl Transport + Send + Sync + 'static,
        store: impl VariableStore + Send + 'static,
        cfg: DutyCycleConfig,
    ) -> Result<Self> {
        let peer = Self::unstarted(
            PeerShared::new(address, Box::new(clock), Box::new(transport), Box::new(store), cfg),
            true,
        );
        let start = peer.resume_point();
        peer.start_duty_cycle(start)?;
        Ok(peer)
    }

    /// Build the peer without starting the scheduler. With `load`, persisted
    /// variables are read; otherwise defaults are written out.
    pub(crate) fn unstarted(shared: PeerShared, load: bool) -> Self {
        if load {
            let cursor = {
                let mut vars = lock(&shared.vars);
                vars.values = vars.storage.load_all();
                vars.values.rotation_cursor
            };
            lock(&shared.pairing).rotation = DeviceRotation::new(cursor);
        } else {
            let mut vars = lock(&shared.vars);
            let values = vars.values;
            if let Err(e) = vars.storage.save_all(&values) {
                tracing::warn!(error = %e, "initial peer variables not persisted");
            }
        }
        Self {
            shared: Arc::new(shared),
            scheduler: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Where a restored peer picks up, given its persisted variables.
    pub fn resume_point(&self) -> ResumePoint {
        let vars = lock(&self.shared.vars);
        resume(
            self.shared.address,
            vars.values.last_duty_cycle_event,
            vars.values.message_counter,
            self.shared.clock.now_us(),
            &self.shared.cfg.timing,
        )
    }

    pub fn address(&self) -> u32 {
        self.shared.address
    }

    /// Start the scheduler thread. A second call only logs; a disposed peer
    /// cannot be restarted.
    pub fn start_duty_cycle(&self, start: ResumePoint) -> Result<()> {
        if self.is_disposed() {
            return Err(DutyCycleError::State("peer is disposed".into()).into());
        }
        if self.started.swap(true, Ordering::AcqRel) {
            tracing::error!(
                address = format_args!("{:06X}", self.shared.address),
                "duty cycle thread already started"
            );
            return Ok(());
        }
        match scheduler::spawn(Arc::clone(&self.shared), start) {
            Ok(handle) => {
                *lock(&self.scheduler) = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.started.store(false, Ordering::Release);
                Err(DutyCycleError::Thread(format!("spawning scheduler thread: {e}")).into())
            }
        }
    }

    /// Set the desired valve opening in percent. Returns the protocol byte
    /// that the next packets will carry.
    pub fn set_valve_state(&self, percent: i32) -> u8 {
        let mut vars = lock(&self.shared.vars);
        let pending = vars.values.valve.set_pending(percent);
        vars.storage
            .save_logged(Variable::NewValveState, i64::from(pending));
        tracing::info!(percent, pending, "valve state set");
        pending
    }

    pub fn valve_state(&self) -> ValveStateEncoder {
        lock(&self.shared.vars).values.valve
    }

    /// Pair sub-peer `channel` through valve drive `address`.
    pub fn pair_valve_drive(&self, address: u32, channel: u8) {
        let mut pairing = lock(&self.shared.pairing);
        if pairing.registry.pair(address, channel) {
            pairing.decalc.clear(address);
        }
        tracing::info!(drive = format_args!("{address:06X}"), channel, "valve drive paired");
    }

    /// Register a valve drive without sub-peers; it stays out of rotation.
    pub fn add_valve_drive(&self, address: u32) {
        let mut pairing = lock(&self.shared.pairing);
        if !pairing.registry.contains(address) {
            pairing.registry.insert(address);
            pairing.decalc.clear(address);
        }
    }

    pub fn unpair_valve_drive(&self, address: u32, channel: u8) -> bool {
        let removed = lock(&self.shared.pairing).registry.unpair(address, channel);
        if removed {
            tracing::info!(drive = format_args!("{address:06X}"), channel, "valve drive unpaired");
        }
        removed
    }

    /// Forget a valve drive with all its channels.
    pub fn remove_valve_drive(&self, address: u32) -> bool {
        let mut pairing = lock(&self.shared.pairing);
        let removed = pairing.registry.remove(address);
        pairing.decalc.remove(address);
        removed
    }

    /// Advance the rotation outside a transmission.
    pub fn next_duty_cycle_device_address(&self) -> Option<u32> {
        let mut pairing = lock(&self.shared.pairing);
        let p = &mut *pairing;
        let next = p.rotation.next(&p.registry)?;
        let mut vars = lock(&self.shared.vars);
        vars.values.rotation_cursor = Some(next);
        vars.storage
            .save_logged(Variable::RotationCursor, i64::from(next));
        Some(next)
    }

    /// Write all persisted variables.
    pub fn save_variables(&self) -> Result<()> {
        let cursor = lock(&self.shared.pairing).rotation.cursor();
        let mut vars = lock(&self.shared.vars);
        vars.values.rotation_cursor = cursor;
        let values = vars.values;
        vars.storage.save_all(&values)?;
        Ok(())
    }

    pub fn status(&self) -> PeerStatus {
        let (cursor, drives) = {
            let pairing = lock(&self.shared.pairing);
            (pairing.rotation.cursor(), pairing.registry.len())
        };
        let values = lock(&self.shared.vars).values;
        let next = (values.last_duty_cycle_event >= 0).then(|| {
            next_deadline_us(
                self.shared.address,
                values.last_duty_cycle_event,
                values.message_counter,
                self.shared.cfg.timing.time_offset_us,
            )
        });
        PeerStatus {
            address: self.shared.address,
            phase: self.shared.phase.get(),
            message_counter: values.message_counter,
            last_duty_cycle_event: values.last_duty_cycle_event,
            next_duty_cycle_event: next,
            valve_current: values.valve.current(),
            valve_pending: values.valve.pending(),
            rotation_cursor: cursor,
            valve_drives: drives,
            transmissions: self.shared.transmissions.load(Ordering::Relaxed),
        }
    }

    /// Stop both threads and wait for them. Idempotent.
    pub fn dispose(&self) {
        self.shared.cancel.cancel();
        let handle = lock(&self.scheduler).take();
        if let Some(handle) = handle {
            match handle.join() {
                Ok(()) => tracing::debug!("scheduler thread joined"),
                Err(e) => tracing::warn!(?e, "scheduler thread panicked"),
            }
        }
        if self.shared.phase.get() == SchedulerPhase::Idle {
            self.shared.phase.set(SchedulerPhase::Stopped);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }
}

impl Drop for ThermostatPeer {
    fn drop(&mut self) {
        self.dispose();
    }
}
