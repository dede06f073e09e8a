//! `run`: a peer from config against the console radio, until Ctrl-C or the
//! optional duration elapses.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use dutycycle_core::{FileStore, MemoryStore, PeerBuilder, PeerStatus, StartMode};
use eyre::WrapErr;

use crate::radio::ConsoleRadio;

const POLL: Duration = Duration::from_millis(100);

pub struct RunParams {
    pub valve: Option<i32>,
    pub duration: Option<Duration>,
    pub fresh: bool,
    pub json: bool,
}

pub fn run_peer(cfg: &dutycycle_config::Config, params: &RunParams) -> eyre::Result<PeerStatus> {
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
            .wrap_err("installing Ctrl-C handler")?;
    }

    let mode = if params.fresh {
        StartMode::Fresh
    } else {
        StartMode::Restore
    };
    let mut builder = PeerBuilder::from_config(cfg)
        .with_transport(ConsoleRadio::new(params.json))
        .with_mode(mode);
    if let Some(percent) = params.valve {
        builder = builder.with_initial_valve(percent);
    }
    builder = match cfg.persistence.state_file.as_deref() {
        Some(path) => builder.with_store(FileStore::open(path)?),
        None => {
            tracing::warn!("no persistence.state_file configured; state is kept in memory");
            builder.with_store(MemoryStore::default())
        }
    };

    let peer = builder.try_build()?;
    tracing::info!(
        peer_id = cfg.peer.id,
        address = format_args!("{:06X}", peer.address()),
        ?mode,
        "peer running"
    );

    let started = Instant::now();
    loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("interrupted");
            break;
        }
        if params.duration.is_some_and(|d| started.elapsed() >= d) {
            break;
        }
        std::thread::sleep(POLL);
    }

    let saved = peer.save_variables();
    peer.dispose();
    let status = peer.status();
    saved.wrap_err("saving peer variables on shutdown")?;
    Ok(status)
}
