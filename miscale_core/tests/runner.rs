use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use miscale_core::mocks::{FailingStore, ScriptEnd, ScriptedTransport};
use miscale_core::{
    Gender, MeasurementStore, MemoryStore, RecordingSink, RunnerCfg, ScaleError, Session,
    SessionState, StabilityCfg, StatusLevel, UserProfile, run_session,
};
use miscale_traits::clock::test_clock::TestClock;
use miscale_traits::{Clock, MonotonicClock};

fn session() -> Session {
    Session::new(
        UserProfile::new(30, 178.0, Gender::Male).expect("profile"),
        StabilityCfg {
            required_readings: 3,
            weight_tolerance_kg: 0.1,
            min_stable_ms: 3_000,
        },
    )
    .expect("session")
}

fn runner_cfg() -> RunnerCfg {
    RunnerCfg {
        idle_tick_ms: 10,
        notify_timeout_ms: 10,
        max_session_ms: 0,
        channel_capacity: 4,
    }
}

fn scale_error(r: &eyre::Report) -> ScaleError {
    r.downcast_ref::<ScaleError>()
        .cloned()
        .unwrap_or_else(|| panic!("expected ScaleError, got {r:#}"))
}

#[test]
fn completes_on_a_paced_script_and_stops_the_transport() {
    let clock = TestClock::new();
    let shared: Arc<dyn Clock + Send + Sync> = Arc::new(clock.clone());
    let transport = ScriptedTransport::from_weights(
        &[0.0, 35.0, 70.0, 70.05, 70.02, 75.0, 70.0, 70.0, 70.0, 70.0, 70.0, 70.0, 70.0],
        505,
    )
    .paced(shared, Duration::from_secs(1));
    let stopped = transport.stopped_flag();

    let mut s = session();
    let sink = RecordingSink::new();
    let store = MemoryStore::new();
    let cancel = AtomicBool::new(false);

    let m = run_session(
        transport,
        &mut s,
        Some("AA:BB:CC:DD:EE:FF"),
        &runner_cfg(),
        &sink,
        &store,
        &cancel,
        clock,
    )
    .expect("session completes");

    assert_eq!(m.weight, 70.0);
    assert_eq!(m.impedance, 505);
    assert_eq!(s.state(), SessionState::Finalized);
    assert_eq!(s.device(), Some("AA:BB:CC:DD:EE:FF"));
    assert_eq!(store.query(None).expect("query").len(), 1);
    assert!(stopped.load(Ordering::Relaxed));

    let levels = sink.levels();
    assert_eq!(levels[0], StatusLevel::Info);
    assert_eq!(levels.last(), Some(&StatusLevel::Success));
}

#[test]
fn connect_failure_aborts_with_transport_failure() {
    let transport = ScriptedTransport::new(Vec::new()).failing_connect("no adapter");
    let mut s = session();
    let sink = RecordingSink::new();
    let err = run_session(
        transport,
        &mut s,
        None,
        &runner_cfg(),
        &sink,
        &MemoryStore::new(),
        &AtomicBool::new(false),
        MonotonicClock::new(),
    )
    .expect_err("connect fails");
    assert_eq!(
        scale_error(&err),
        ScaleError::TransportFailure("no adapter".into())
    );
    assert_eq!(s.state(), SessionState::Aborted);
    assert_eq!(sink.levels().last(), Some(&StatusLevel::Error));
}

#[test]
fn mid_stream_disconnect_aborts() {
    let transport =
        ScriptedTransport::from_weights(&[60.0, 70.0], 500).then(ScriptEnd::Fail("link lost".into()));
    let mut s = session();
    let err = run_session(
        transport,
        &mut s,
        None,
        &runner_cfg(),
        &RecordingSink::new(),
        &MemoryStore::new(),
        &AtomicBool::new(false),
        MonotonicClock::new(),
    )
    .expect_err("disconnect");
    assert_eq!(scale_error(&err), ScaleError::TransportFailure("link lost".into()));
}

#[test]
fn transport_timeouts_map_to_timeout() {
    let transport = ScriptedTransport::new(Vec::new())
        .then(ScriptEnd::Fail("scale notification timeout".into()));
    let mut s = session();
    let err = run_session(
        transport,
        &mut s,
        None,
        &runner_cfg(),
        &RecordingSink::new(),
        &MemoryStore::new(),
        &AtomicBool::new(false),
        MonotonicClock::new(),
    )
    .expect_err("timeout");
    assert_eq!(scale_error(&err), ScaleError::Timeout);
}

#[test]
fn raised_cancel_flag_stops_with_info_event() {
    let mut s = session();
    let sink = RecordingSink::new();
    let cancel = Arc::new(AtomicBool::new(false));
    let flip = cancel.clone();
    let t = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        flip.store(true, Ordering::Release);
    });
    let err = run_session(
        ScriptedTransport::new(Vec::new()),
        &mut s,
        None,
        &runner_cfg(),
        &sink,
        &MemoryStore::new(),
        &cancel,
        MonotonicClock::new(),
    )
    .expect_err("cancelled");
    t.join().expect("join");
    assert_eq!(scale_error(&err), ScaleError::Cancelled);
    let last = sink.events().pop().expect("event");
    assert_eq!(last.level, StatusLevel::Info);
    assert_eq!(last.message, "Measurement stopped");
}

#[test]
fn max_session_ms_caps_a_quiet_session() {
    let cfg = RunnerCfg {
        max_session_ms: 50,
        ..runner_cfg()
    };
    let mut s = session();
    let err = run_session(
        ScriptedTransport::new(Vec::new()),
        &mut s,
        None,
        &cfg,
        &RecordingSink::new(),
        &MemoryStore::new(),
        &AtomicBool::new(false),
        MonotonicClock::new(),
    )
    .expect_err("timed out");
    assert_eq!(
        scale_error(&err),
        ScaleError::TransportFailure("session timed out".into())
    );
}

#[test]
fn store_failure_surfaces_as_persistence_failure() {
    let clock = TestClock::new();
    let shared: Arc<dyn Clock + Send + Sync> = Arc::new(clock.clone());
    let transport =
        ScriptedTransport::from_weights(&[70.0; 8], 500).paced(shared, Duration::from_secs(1));
    let mut s = session();
    let sink = RecordingSink::new();
    let err = run_session(
        transport,
        &mut s,
        None,
        &runner_cfg(),
        &sink,
        &FailingStore,
        &AtomicBool::new(false),
        clock,
    )
    .expect_err("write fails");
    assert!(matches!(scale_error(&err), ScaleError::PersistenceFailure(_)));
    assert_eq!(
        sink.levels()
            .iter()
            .filter(|l| **l == StatusLevel::Success)
            .count(),
        0
    );
}

#[test]
fn malformed_frames_do_not_end_the_session() {
    let clock = TestClock::new();
    let shared: Arc<dyn Clock + Send + Sync> = Arc::new(clock.clone());
    let mut frames: Vec<Vec<u8>> = vec![vec![0u8; 4]];
    frames.extend((0..8).map(|_| miscale_core::encode(70.0, 500).to_vec()));
    let transport = ScriptedTransport::new(frames).paced(shared, Duration::from_secs(1));
    let mut s = session();
    let sink = RecordingSink::new();
    run_session(
        transport,
        &mut s,
        None,
        &runner_cfg(),
        &sink,
        &MemoryStore::new(),
        &AtomicBool::new(false),
        clock,
    )
    .expect("completes despite bad frame");
    assert!(sink.levels().contains(&StatusLevel::Error));
    assert_eq!(sink.levels().last(), Some(&StatusLevel::Success));
}
