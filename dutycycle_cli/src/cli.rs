//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

fn parse_address(s: &str) -> Result<u32, String> {
    let a = dutycycle_config::parse_address(s)?;
    if a == 0 || a > dutycycle_config::MAX_ADDRESS {
        return Err(format!("address {s:?} is not a 24-bit device address"));
    }
    Ok(a)
}

#[derive(Parser, Debug)]
#[command(name = "dutycycle", version, about = "Thermostat duty-cycle engine")]
pub struct Cli {
    /// Path to config TOML (required by `run` and `check-config`)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Print output and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a peer against a simulated radio that prints every packet
    Run {
        /// Valve opening in percent (overrides [valve].initial_percent)
        #[arg(long, value_name = "PERCENT", value_parser = clap::value_parser!(i32).range(0..=100))]
        valve: Option<i32>,
        /// Stop after this many seconds; runs until Ctrl-C when omitted
        #[arg(long = "duration-s", value_name = "SECONDS")]
        duration_s: Option<u64>,
        /// Ignore persisted history and start a cycle now
        #[arg(long, action = ArgAction::SetTrue)]
        fresh: bool,
    },
    /// Print the next cycles of a peer
    Plan {
        /// Peer address, hex ("0x1A2B3C") or decimal
        #[arg(long, value_parser = parse_address)]
        address: u32,
        /// Message counter of the next transmission
        #[arg(long, default_value_t = 0)]
        counter: u8,
        /// Number of cycles to print
        #[arg(long, default_value_t = 8)]
        count: u16,
        /// Last duty-cycle event in microseconds since the epoch
        #[arg(long = "from-us", value_name = "US", default_value_t = 0)]
        from_us: i64,
    },
    /// Compute where a restarted peer picks up its cycle
    Resume {
        /// Peer address, hex ("0x1A2B3C") or decimal
        #[arg(long, value_parser = parse_address)]
        address: u32,
        /// Persisted last duty-cycle event, microseconds since the epoch
        #[arg(long = "last-event-us", value_name = "US", allow_hyphen_values = true)]
        last_event_us: i64,
        /// Persisted message counter
        #[arg(long)]
        counter: u8,
        /// Current time in microseconds since the epoch (defaults to now)
        #[arg(long = "now-us", value_name = "US")]
        now_us: Option<i64>,
    },
    /// Load and validate the config, then exit
    CheckConfig,
}
