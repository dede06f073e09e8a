#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Thermostat duty-cycle engine (radio-agnostic).
//!
//! A virtual wall thermostat tells its paired valve drives how far to open,
//! one packet per duty cycle. Cycle lengths are derived from the thermostat's
//! address and the message counter, so the receivers know when to listen.
//! All radio and storage interactions go through `dutycycle_traits::Transport`
//! and `dutycycle_traits::VariableStore`.
//!
//! ## Architecture
//!
//! - **Cycle**: cycle-length hash and phase recovery after restart (`cycle`)
//! - **Valve**: percent to protocol byte, adjustment commands (`valve`)
//! - **Rotation**: round-robin over paired valve drives (`rotation`)
//! - **Decalcification**: weekly one-shot maintenance flags (`decalc`)
//! - **Threads**: scheduler loop and transmission tasks (`scheduler`, `transmission`)
//! - **Persistence**: variables surviving a restart (`persistence`, `store`)
//! - **Facade**: `ThermostatPeer` and its builder (`peer`, `builder`)
//!
//! ## Time
//!
//! All absolute times are microseconds since the Unix epoch as reported by
//! the injected `Clock`. Cycle lengths are counted in quarter-seconds.

pub mod builder;
pub mod cancel;
pub mod config;
pub mod conversions;
pub mod cycle;
pub mod decalc;
pub mod error;
pub mod mocks;
pub mod peer;
pub mod persistence;
pub mod rotation;
pub mod rt;
pub mod scheduler;
pub mod status;
pub mod store;
pub mod transmission;
pub mod util;
pub mod valve;

pub use builder::{PeerBuilder, StartMode};
pub use config::{DecalcificationCfg, DutyCycleConfig, RtCfg, TimingCfg, VariableIds};
pub use cycle::{ResumePoint, cycle_length, cycle_length_us, resume};
pub use error::{BuildError, DutyCycleError, Report, Result};
pub use peer::ThermostatPeer;
pub use status::{PeerStatus, SchedulerPhase};
pub use store::{FileStore, MemoryStore};
pub use transmission::TransmissionOutcome;
pub use valve::{AdjustmentCommand, ValveStateEncoder, percent_to_valve_byte};
