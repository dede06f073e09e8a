#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the thermostat duty-cycle engine.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Device addresses accept either integers or hex strings ("0x1A2B3C").
//! - Every timing constant has a default equal to the protocol's expectation,
//!   so a minimal config only needs `[peer]`.
use serde::Deserialize;
use serde::de::{self, Deserializer};

/// Largest valid 24-bit radio address.
pub const MAX_ADDRESS: u32 = 0x00FF_FFFF;
/// Duty-cycle tick; cycle lengths are counted in these units.
pub const QUARTER_SECOND_MS: u64 = 250;

#[derive(Debug, Deserialize)]
pub struct PeerCfg {
    /// Gateway-local peer id (used in log context only).
    pub id: u64,
    /// Own radio address, used as packet sender and cycle-length seed.
    #[serde(deserialize_with = "de_address")]
    pub address: u32,
    #[serde(default)]
    pub serial: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimingCfg {
    /// Correction added to every cycle; without it packets go out early.
    pub time_offset_us: i64,
    /// Coarse wait ends this many quarter-second ticks before the cycle end.
    pub coarse_lead_ticks: u32,
    /// Fine wait ends this many ticks before the cycle end.
    pub fine_lead_ticks: u32,
    /// Scheduler-side corrective sleeps, as leads before the deadline.
    pub precision_leads_ms: Vec<u64>,
    /// Transmission-side corrective sleeps, as leads before the deadline.
    pub transmission_leads_ms: Vec<u64>,
    /// Upper bound for any single transmission-side sleep.
    pub max_transmission_sleep_ms: u64,
    /// Stored state older than this is not resumed.
    pub resync_threshold_ms: u64,
    /// Resume projects events until this far past "now".
    pub resume_horizon_ms: u64,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            time_offset_us: 3000,
            coarse_lead_ticks: 80,
            fine_lead_ticks: 40,
            precision_leads_ms: vec![5000, 2000],
            transmission_leads_ms: vec![1000, 500, 100, 30],
            max_transmission_sleep_ms: 1000,
            resync_threshold_ms: 1_800_000,
            resume_horizon_ms: 25_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    #[default]
    Saturday,
    Sunday,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DecalcificationCfg {
    pub enabled: bool,
    pub weekday: Weekday,
    pub hour: u32,
    /// First minute of the window (inclusive).
    pub start_minute: u32,
    /// Last minute of the window (inclusive, whole minute).
    pub end_minute: u32,
}

impl Default for DecalcificationCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            weekday: Weekday::Saturday,
            hour: 14,
            start_minute: 0,
            end_minute: 3,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct VariableIdsCfg {
    pub rotation_cursor: u32,
    pub valve_state: u32,
    pub new_valve_state: u32,
    pub last_duty_cycle_event: u32,
    pub message_counter: u32,
}

impl Default for VariableIdsCfg {
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

impl VariableIdsCfg {
    fn all(&self) -> [u32; 5] {
        [
            self.rotation_cursor,
            self.valve_state,
            self.new_valve_state,
            self.last_duty_cycle_event,
            self.message_counter,
        ]
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct PersistenceCfg {
    /// Path of the TOML state file; in-memory only when absent.
    pub state_file: Option<String>,
    pub ids: VariableIdsCfg,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RtCfg {
    /// Request SCHED_FIFO for the scheduler and transmission threads.
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

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ValveCfg {
    /// Valve opening (percent) applied before the first cycle.
    pub initial_percent: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct ValveDriveCfg {
    #[serde(deserialize_with = "de_address")]
    pub address: u32,
    /// Paired sub-peer channels; an empty list keeps the drive out of rotation.
    #[serde(default)]
    pub channels: Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub peer: PeerCfg,
    #[serde(default)]
    pub timing: TimingCfg,
    #[serde(default)]
    pub decalcification: DecalcificationCfg,
    #[serde(default)]
    pub persistence: PersistenceCfg,
    #[serde(default)]
    pub rt: RtCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub valve: ValveCfg,
    #[serde(default)]
    pub valve_drives: Vec<ValveDriveCfg>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AddressToml {
    Int(u32),
    Text(String),
}

/// Parse "0x1A2B3C", "1A2B3C" (hex) or plain decimal digits.
pub fn parse_address(s: &str) -> Result<u32, String> {
    let t = s.trim();
    let (digits, radix) = match t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None if t.chars().all(|c| c.is_ascii_digit()) => (t, 10),
        None => (t, 16),
    };
    u32::from_str_radix(digits, radix).map_err(|e| format!("invalid address {s:?}: {e}"))
}

fn de_address<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    match AddressToml::deserialize(deserializer)? {
        AddressToml::Int(v) => Ok(v),
        AddressToml::Text(s) => parse_address(&s).map_err(de::Error::custom),
    }
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))
}

fn strictly_decreasing(v: &[u64]) -> bool {
    v.windows(2).all(|w| w[0] > w[1])
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Peer
        if self.peer.address == 0 || self.peer.address > MAX_ADDRESS {
            eyre::bail!("peer.address must be in 0x000001..=0xFFFFFF");
        }

        // Timing
        let t = &self.timing;
        if t.fine_lead_ticks == 0 {
            eyre::bail!("timing.fine_lead_ticks must be >= 1");
        }
        if t.coarse_lead_ticks <= t.fine_lead_ticks {
            eyre::bail!("timing.coarse_lead_ticks must be > timing.fine_lead_ticks");
        }
        if t.coarse_lead_ticks >= 480 {
            eyre::bail!("timing.coarse_lead_ticks must be < 480 (shortest cycle)");
        }
        if t.time_offset_us.abs() > 1_000_000 {
            eyre::bail!("timing.time_offset_us must be within +/- 1 s");
        }
        if t.precision_leads_ms.is_empty() || !strictly_decreasing(&t.precision_leads_ms) {
            eyre::bail!("timing.precision_leads_ms must be non-empty and strictly decreasing");
        }
        let fine_window_ms = u64::from(t.fine_lead_ticks).saturating_mul(QUARTER_SECOND_MS);
        if t.precision_leads_ms[0] > fine_window_ms {
            eyre::bail!(
                "timing.precision_leads_ms must not exceed the fine wait window ({fine_window_ms} ms)"
            );
        }
        if t.transmission_leads_ms.is_empty() || !strictly_decreasing(&t.transmission_leads_ms) {
            eyre::bail!("timing.transmission_leads_ms must be non-empty and strictly decreasing");
        }
        if let (Some(&last_precision), Some(&first_tx)) = (
            t.precision_leads_ms.last(),
            t.transmission_leads_ms.first(),
        ) && first_tx >= last_precision
        {
            eyre::bail!(
                "timing.transmission_leads_ms must start below the last precision lead ({last_precision} ms)"
            );
        }
        if t.max_transmission_sleep_ms == 0 {
            eyre::bail!("timing.max_transmission_sleep_ms must be >= 1");
        }
        if t.resume_horizon_ms == 0 {
            eyre::bail!("timing.resume_horizon_ms must be >= 1");
        }
        if t.resync_threshold_ms <= t.resume_horizon_ms {
            eyre::bail!("timing.resync_threshold_ms must be > timing.resume_horizon_ms");
        }

        // Decalcification
        let d = &self.decalcification;
        if d.hour > 23 {
            eyre::bail!("decalcification.hour must be in [0, 23]");
        }
        if d.end_minute > 59 || d.start_minute > d.end_minute {
            eyre::bail!("decalcification minutes must satisfy start_minute <= end_minute <= 59");
        }

        // Persistence
        let ids = self.persistence.ids.all();
        for (i, a) in ids.iter().enumerate() {
            if ids[i + 1..].contains(a) {
                eyre::bail!("persistence.ids must be distinct (duplicate {a})");
            }
        }

        // RT
        for (name, p) in [
            ("rt.scheduler_priority", self.rt.scheduler_priority),
            ("rt.transmission_priority", self.rt.transmission_priority),
        ] {
            if !(1..=99).contains(&p) {
                eyre::bail!("{name} must be in [1, 99]");
            }
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Valve
        if let Some(p) = self.valve.initial_percent
            && p > 100
        {
            eyre::bail!("valve.initial_percent must be in [0, 100]");
        }

        // Valve drives
        for (i, vd) in self.valve_drives.iter().enumerate() {
            if vd.address == 0 || vd.address > MAX_ADDRESS {
                eyre::bail!("valve_drives[{i}].address must be in 0x000001..=0xFFFFFF");
            }
            if vd.address == self.peer.address {
                eyre::bail!("valve_drives[{i}].address must differ from peer.address");
            }
            if self.valve_drives[..i].iter().any(|o| o.address == vd.address) {
                eyre::bail!("valve_drives[{i}].address 0x{:06X} is listed twice", vd.address);
            }
        }

        Ok(())
    }
}
