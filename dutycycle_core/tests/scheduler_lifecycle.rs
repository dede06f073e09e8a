//! Scheduler thread lifecycle: prompt cancellation, guarded start, strictly
//! sequential transmissions, and the weekly decalcification command.

use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate, TimeZone};

use dutycycle_core::mocks::{MemoryStore, RecordingTransport};
use dutycycle_core::{
    AdjustmentCommand, DecalcificationCfg, DutyCycleConfig, ResumePoint, SchedulerPhase, StartMode,
    ThermostatPeer,
};
use dutycycle_traits::clock::MonotonicClock;
use dutycycle_traits::clock::test_clock::AcceleratedClock;

const SELF: u32 = 0x3F0C8E;
const DRIVE_A: u32 = 0x1F00AA;
const DRIVE_B: u32 = 0x1F00BB;

fn wait_for_phase(peer: &ThermostatPeer, phase: SchedulerPhase, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if peer.status().phase == phase {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn dispose_during_coarse_wait_returns_within_a_tick() {
    let transport = RecordingTransport::new();
    let peer = ThermostatPeer::builder()
        .with_address(SELF)
        .with_clock(MonotonicClock::new())
        .with_transport(transport.clone())
        .with_store(MemoryStore::default())
        .with_valve_drive(DRIVE_A, 1)
        .with_mode(StartMode::Fresh)
        .try_build()
        .expect("peer");

    assert!(wait_for_phase(&peer, SchedulerPhase::CoarseWait, Duration::from_secs(2)));

    let t0 = Instant::now();
    peer.dispose();
    let took = t0.elapsed();
    // At most one 250 ms tick plus the join.
    assert!(took < Duration::from_millis(300), "dispose took {took:?}");
    assert_eq!(peer.status().phase, SchedulerPhase::Stopped);
    assert!(transport.packets().is_empty());
}

#[test]
fn second_start_is_ignored() {
    let peer = ThermostatPeer::create(
        SELF,
        MonotonicClock::new(),
        RecordingTransport::new(),
        MemoryStore::default(),
        Default::default(),
    )
    .expect("peer");
    assert!(wait_for_phase(&peer, SchedulerPhase::CoarseWait, Duration::from_secs(2)));
    let before = peer.status();

    peer.start_duty_cycle(ResumePoint::Fresh).expect("no-op");

    let after = peer.status();
    assert_eq!(after.last_duty_cycle_event, before.last_duty_cycle_event);
    assert_eq!(after.message_counter, before.message_counter);
    peer.dispose();
    assert!(peer.is_disposed());
    // Idempotent.
    peer.dispose();
}

#[test]
fn drop_joins_threads() {
    let transport = RecordingTransport::new();
    {
        let _peer = ThermostatPeer::create(
            SELF,
            MonotonicClock::new(),
            transport.clone(),
            MemoryStore::default(),
            Default::default(),
        )
        .expect("peer");
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(transport.packets().is_empty());
}

#[test]
fn transmissions_never_overlap() {
    // 200x: one cycle takes roughly 0.6-0.9 s of real time.
    let clock = AcceleratedClock::new(200);
    let transport = RecordingTransport::new().with_delay(Duration::from_millis(30));
    let store = MemoryStore::default();
    let peer = ThermostatPeer::builder()
        .with_address(SELF)
        .with_clock(clock)
        .with_transport(transport.clone())
        .with_store(store.clone())
        .with_config(DutyCycleConfig {
            // Keep the wall-clock window out of the payload assertions.
            decalcification: DecalcificationCfg {
                enabled: false,
                ..DecalcificationCfg::default()
            },
            ..DutyCycleConfig::default()
        })
        .with_valve_drive(DRIVE_A, 1)
        .with_valve_drive(DRIVE_B, 1)
        .with_initial_valve(40)
        .with_mode(StartMode::Fresh)
        .try_build()
        .expect("peer");

    for i in 0..3 {
        assert!(
            transport.recv_timeout(Duration::from_secs(5)).is_some(),
            "packet {i} not sent"
        );
    }
    peer.dispose();

    let history = transport.history();
    assert!(history.len() >= 3);
    assert_eq!(transport.max_in_flight(), 1);
    for pair in history.windows(2) {
        assert!(pair[1].started >= pair[0].finished);
        let (a, b) = (&pair[0].packet, &pair[1].packet);
        assert_eq!(b.message_counter, a.message_counter.wrapping_add(1));
        // Two drives with sub-peers alternate.
        assert_ne!(a.receiver, b.receiver);
    }

    let first = &history[0].packet;
    assert_eq!(first.message_counter, 0);
    assert_eq!(first.sender, SELF);
    // 40 % -> 102, differs from the unsent current state.
    assert_eq!(first.payload, vec![3, 102]);
    // Later packets carry the acknowledged state: no change, no command.
    assert_eq!(history[1].packet.payload, vec![0, 102]);

    let status = peer.status();
    assert_eq!(status.valve_current, 102);
    assert_eq!(store.get(1004), Some(102));
    assert!(status.transmissions >= 3);
}

#[test]
fn decalcification_window_sends_decalcify_command() {
    // Saturday 2024-06-01 14:00:00 local time, inside the default window.
    let start = NaiveDate::from_ymd_opt(2024, 6, 1)
        .and_then(|d| d.and_hms_opt(14, 0, 0))
        .expect("valid date");
    let origin_us = Local
        .from_local_datetime(&start)
        .earliest()
        .expect("local time exists")
        .timestamp_micros();

    // 200x: the first cycle ends well before 14:03.
    let clock = AcceleratedClock::starting_at(origin_us, 200);
    let transport = RecordingTransport::new();
    let peer = ThermostatPeer::builder()
        .with_address(SELF)
        .with_clock(clock)
        .with_transport(transport.clone())
        .with_store(MemoryStore::default())
        .with_valve_drive(DRIVE_A, 1)
        .with_mode(StartMode::Fresh)
        .try_build()
        .expect("peer");

    let first = transport
        .recv_timeout(Duration::from_secs(5))
        .expect("packet sent");
    peer.dispose();

    assert_eq!(first.receiver, DRIVE_A);
    assert_eq!(first.command(), Some(AdjustmentCommand::Decalcify.as_byte()));
    assert_eq!(first.payload[0], 4);
}
