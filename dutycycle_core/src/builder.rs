//! Builder for [`ThermostatPeer`] and a constructor from the TOML config.
//!
//! `try_build()` checks that an address, a transport and a store were given
//! and that the timing makes sense before any thread is spawned.

use dutycycle_traits::clock::{Clock, MonotonicClock};
use dutycycle_traits::{Transport, VariableStore};

use crate::config::DutyCycleConfig;
use crate::cycle::{MIN_CYCLE_LENGTH, ResumePoint};
use crate::error::{BuildError, Result};
use crate::peer::{PeerShared, ThermostatPeer};

/// How the scheduler starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartMode {
    /// Ignore stored history and start a cycle now.
    Fresh,
    /// Resume from stored variables when they are recent enough.
    #[default]
    Restore,
}

pub struct PeerBuilder {
    address: Option<u32>,
    clock: Box<dyn Clock + Send + Sync>,
    transport: Option<Box<dyn Transport + Send + Sync>>,
    store: Option<Box<dyn VariableStore + Send>>,
    config: DutyCycleConfig,
    valve_drives: Vec<(u32, Option<u8>)>,
    initial_percent: Option<i32>,
    mode: StartMode,
}

impl Default for PeerBuilder {
    fn default() -> Self {
        Self {
            address: None,
            clock: Box::new(MonotonicClock::new()),
            transport: None,
            store: None,
            config: DutyCycleConfig::default(),
            valve_drives: Vec::new(),
            initial_percent: None,
            mode: StartMode::default(),
        }
    }
}

impl std::fmt::Debug for PeerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerBuilder")
            .field("address", &self.address)
            .field("has_transport", &self.transport.is_some())
            .field("has_store", &self.store.is_some())
            .field("valve_drives", &self.valve_drives)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl ThermostatPeer {
    pub fn builder() -> PeerBuilder {
        PeerBuilder::default()
    }
}

fn validate(cfg: &DutyCycleConfig) -> Result<()> {
    let t = &cfg.timing;
    if t.fine_lead_ticks == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "fine_lead_ticks must be >= 1",
        )));
    }
    if t.coarse_lead_ticks <= t.fine_lead_ticks {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "coarse_lead_ticks must exceed fine_lead_ticks",
        )));
    }
    if t.coarse_lead_ticks >= MIN_CYCLE_LENGTH {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "coarse_lead_ticks must be shorter than the shortest cycle",
        )));
    }
    if t.precision_leads.is_empty() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "precision_leads must not be empty",
        )));
    }
    if t.max_transmission_sleep.is_zero() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "max_transmission_sleep must be > 0",
        )));
    }
    if t.resume_horizon_us <= 0 || t.resync_threshold_us <= t.resume_horizon_us {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "resync_threshold must exceed a positive resume_horizon",
        )));
    }
    Ok(())
}

impl PeerBuilder {
    /// Preload address, timing, valve drives and initial valve from config.
    pub fn from_config(cfg: &dutycycle_config::Config) -> Self {
        let mut b = Self::default()
            .with_address(cfg.peer.address)
            .with_config(DutyCycleConfig::from(cfg));
        for drive in &cfg.valve_drives {
            if drive.channels.is_empty() {
                b.valve_drives.push((drive.address, None));
            }
            for &channel in &drive.channels {
                b = b.with_valve_drive(drive.address, channel);
            }
        }
        if let Some(p) = cfg.valve.initial_percent {
            b = b.with_initial_valve(i32::from(p));
        }
        b
    }

    pub fn with_address(mut self, address: u32) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_transport(mut self, transport: impl Transport + Send + Sync + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn with_store(mut self, store: impl VariableStore + Send + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn with_config(mut self, config: DutyCycleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_valve_drive(mut self, address: u32, channel: u8) -> Self {
        self.valve_drives.push((address, Some(channel)));
        self
    }

    /// Valve opening in percent applied before the scheduler starts.
    pub fn with_initial_valve(mut self, percent: i32) -> Self {
        self.initial_percent = Some(percent);
        self
    }

    pub fn with_mode(mut self, mode: StartMode) -> Self {
        self.mode = mode;
        self
    }

    /// Validate, create the peer and start its scheduler.
    pub fn try_build(self) -> Result<ThermostatPeer> {
        let address = self
            .address
            .ok_or_else(|| eyre::Report::new(BuildError::MissingAddress))?;
        if address == 0 || address > dutycycle_config::MAX_ADDRESS {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "address must be a 24-bit device address",
            )));
        }
        let transport = self
            .transport
            .ok_or_else(|| eyre::Report::new(BuildError::MissingTransport))?;
        let store = self
            .store
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStore))?;
        validate(&self.config)?;

        let shared = PeerShared::new(address, self.clock, transport, store, self.config);
        let peer = ThermostatPeer::unstarted(shared, self.mode == StartMode::Restore);
        for (drive, channel) in self.valve_drives {
            match channel {
                Some(channel) => peer.pair_valve_drive(drive, channel),
                None => peer.add_valve_drive(drive),
            }
        }
        if let Some(percent) = self.initial_percent {
            peer.set_valve_state(percent);
        }
        let start = match self.mode {
            StartMode::Fresh => ResumePoint::Fresh,
            StartMode::Restore => peer.resume_point(),
        };
        peer.start_duty_cycle(start)?;
        Ok(peer)
    }
}
