#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `dutycycle`: run a simulated thermostat peer and inspect its cycle timing.

mod cli;
mod error_fmt;
mod radio;
mod run;
mod timing;

use std::path::Path;
use std::time::Duration;

use clap::Parser;
use dutycycle_config::{Config, Logging};
use dutycycle_core::{PeerStatus, TimingCfg};
use dutycycle_traits::clock::{Clock, MonotonicClock};
use eyre::{Result, WrapErr, eyre};
use serde_json::json;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE, json_mode};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = real_main(cli) {
        tracing::debug!(error = ?e, "command failed");
        if json_mode() {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: Cli) -> Result<()> {
    color_eyre::install()?;

    let cfg = cli.config.as_deref().map(load_config);
    let logging = cfg.as_ref().and_then(|r| r.as_ref().ok()).map(|c| &c.logging);
    init_tracing(cli.json, cli.log_level.as_deref(), logging)?;
    let cfg = cfg.transpose()?;

    match cli.cmd {
        Commands::Run {
            valve,
            duration_s,
            fresh,
        } => {
            let cfg = cfg.ok_or_else(|| eyre!("`run` needs --config <FILE>"))?;
            let params = run::RunParams {
                valve,
                duration: duration_s.map(Duration::from_secs),
                fresh,
                json: cli.json,
            };
            let status = run::run_peer(&cfg, &params)?;
            print_status(&status, cli.json);
        }
        Commands::Plan {
            address,
            counter,
            count,
            from_us,
        } => {
            let timing_cfg = timing_of(cfg.as_ref());
            for c in timing::plan(address, counter, count, from_us, &timing_cfg) {
                println!("{}", timing::cycle_line(&c, cli.json));
            }
        }
        Commands::Resume {
            address,
            last_event_us,
            counter,
            now_us,
        } => {
            let timing_cfg = timing_of(cfg.as_ref());
            let now = now_us.unwrap_or_else(|| MonotonicClock::new().now_us());
            let v = timing::resume_value(address, last_event_us, counter, now, &timing_cfg);
            if cli.json {
                println!("{v}");
            } else {
                println!("{}", timing::resume_line(&v));
            }
        }
        Commands::CheckConfig => {
            let cfg = cfg.ok_or_else(|| eyre!("`check-config` needs --config <FILE>"))?;
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "ok": true,
                        "address": format!("{:06X}", cfg.peer.address),
                        "valve_drives": cfg.valve_drives.len(),
                    })
                );
            } else {
                println!(
                    "config ok: peer {:06X}, {} valve drive(s)",
                    cfg.peer.address,
                    cfg.valve_drives.len()
                );
            }
        }
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading config {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&text).wrap_err_with(|| format!("parsing config {}", path.display()))?;
    cfg.validate()
        .wrap_err_with(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

fn timing_of(cfg: Option<&Config>) -> TimingCfg {
    cfg.map_or_else(TimingCfg::default, |c| TimingCfg::from(&c.timing))
}

fn init_tracing(json: bool, level: Option<&str>, logging: Option<&Logging>) -> Result<()> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = match level {
        Some(l) => EnvFilter::try_new(l)?,
        None => EnvFilter::try_from_default_env().or_else(|_| {
            EnvFilter::try_new(logging.and_then(|l| l.level.as_deref()).unwrap_or("info"))
        })?,
    };

    // Console logs go to stderr; stdout carries command output.
    let console = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_thread_names(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let file = match logging.and_then(|l| l.file.as_deref()) {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre!("logging.file {file:?} has no file name"))?;
            let rotation = match logging.and_then(|l| l.rotation.as_deref()) {
                Some("daily") => Rotation::DAILY,
                Some("hourly") => Rotation::HOURLY,
                _ => Rotation::NEVER,
            };
            let appender = RollingFileAppender::builder()
                .rotation(rotation)
                .filename_prefix(name.to_string_lossy().into_owned())
                .build(dir)
                .wrap_err_with(|| format!("opening log file {file}"))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().json().with_ansi(false).with_writer(writer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()?;
    Ok(())
}

fn print_status(s: &PeerStatus, json: bool) {
    let cursor = s.rotation_cursor.map(|c| format!("{c:06X}"));
    if json {
        println!(
            "{}",
            json!({
                "event": "stopped",
                "address": format!("{:06X}", s.address),
                "message_counter": s.message_counter,
                "last_duty_cycle_event": s.last_duty_cycle_event,
                "valve_current": s.valve_current,
                "valve_pending": s.valve_pending,
                "rotation_cursor": cursor,
                "transmissions": s.transmissions,
            })
        );
    } else {
        println!(
            "stopped: peer {:06X}, counter {}, valve {}/{}, {} transmission(s), cursor {}",
            s.address,
            s.message_counter,
            s.valve_current,
            s.valve_pending,
            s.transmissions,
            cursor.as_deref().unwrap_or("-")
        );
    }
}
