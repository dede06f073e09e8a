//! Test and helper mocks for dutycycle_core

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use dutycycle_traits::{DutyCyclePacket, Transport};

pub use crate::store::MemoryStore;
use crate::util::lock;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A packet together with when the transport saw it.
#[derive(Debug, Clone)]
pub struct SentPacket {
    pub packet: DutyCyclePacket,
    pub started: Instant,
    pub finished: Instant,
}

/// Transport that records every packet and forwards it on a channel.
///
/// An optional per-send delay makes sends slow enough to catch overlapping
/// transmissions; `max_in_flight` reports the worst concurrency observed.
#[derive(Debug, Clone)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<SentPacket>>>,
    tx: xch::Sender<DutyCyclePacket>,
    rx: xch::Receiver<DutyCyclePacket>,
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    pub fn new() -> Self {
        let (tx, rx) = xch::unbounded();
        Self {
            sent: Arc::default(),
            tx,
            rx,
            delay: Duration::ZERO,
            in_flight: Arc::default(),
            max_in_flight: Arc::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn packets(&self) -> Vec<DutyCyclePacket> {
        lock(&self.sent).iter().map(|s| s.packet.clone()).collect()
    }

    pub fn history(&self) -> Vec<SentPacket> {
        lock(&self.sent).clone()
    }

    /// Block until the next packet arrives or `timeout` passes.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<DutyCyclePacket> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Transport for RecordingTransport {
    fn send(&self, packet: &DutyCyclePacket) -> Result<(), BoxError> {
        let started = Instant::now();
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        lock(&self.sent).push(SentPacket {
            packet: packet.clone(),
            started,
            finished: Instant::now(),
        });
        // Receiver lives as long as self.
        let _ = self.tx.send(packet.clone());
        Ok(())
    }
}

/// Transport whose every send fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingTransport;

impl Transport for FailingTransport {
    fn send(&self, _packet: &DutyCyclePacket) -> Result<(), BoxError> {
        Err(Box::new(std::io::Error::other("radio unavailable")))
    }
}
