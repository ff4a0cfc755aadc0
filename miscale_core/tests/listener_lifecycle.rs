//! Listener thread lifecycle: the pump owns the transport, stops it on exit,
//! and never outlives its `Listener`.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use miscale_core::ScaleError;
use miscale_core::listener::{Listener, Notification};
use miscale_core::mocks::{ScriptEnd, ScriptedTransport};
use miscale_traits::clock::test_clock::TestClock;
use miscale_traits::{Clock, MonotonicClock};

#[test]
fn drop_stops_transport_and_joins() {
    let t = ScriptedTransport::new(Vec::new());
    let stopped = t.stopped_flag();
    let calls = t.stop_calls();
    let l = Listener::spawn(t, Duration::from_millis(5), 4, MonotonicClock::new());
    std::thread::sleep(Duration::from_millis(20));
    drop(l);
    assert!(stopped.load(Ordering::Relaxed));
    assert_eq!(calls.load(Ordering::Relaxed), 1);
}

#[test]
fn drop_does_not_hang_when_queue_is_full() {
    let t = ScriptedTransport::from_weights(&[70.0; 64], 500);
    let stopped = t.stopped_flag();
    let l = Listener::spawn(t, Duration::from_millis(5), 1, MonotonicClock::new());
    // Nobody drains; the pump blocks on a full channel.
    std::thread::sleep(Duration::from_millis(20));
    drop(l);
    assert!(stopped.load(Ordering::Relaxed));
}

#[test]
fn payloads_are_stamped_with_the_clock() {
    let clock = TestClock::new();
    let shared: Arc<dyn Clock + Send + Sync> = Arc::new(clock.clone());
    let t = ScriptedTransport::from_weights(&[70.0, 70.5], 500)
        .paced(shared, Duration::from_millis(250));
    let l = Listener::spawn(t, Duration::from_millis(5), 8, clock.clone());

    let mut stamps = Vec::new();
    while stamps.len() < 2 {
        match l.recv_timeout(Duration::from_secs(1)) {
            Ok(Notification::Payload { bytes, observed_at }) => {
                assert_eq!(bytes.len(), 13);
                stamps.push(observed_at);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(stamps[0], clock.at_secs(0.25));
    assert_eq!(stamps[1], clock.at_secs(0.5));
}

#[test]
fn transport_error_is_forwarded_once_then_stream_closes() {
    let t = ScriptedTransport::new(Vec::new()).then(ScriptEnd::Fail("adapter reset".into()));
    let l = Listener::spawn(t, Duration::from_millis(5), 4, MonotonicClock::new());
    match l.recv_timeout(Duration::from_secs(1)) {
        Ok(Notification::Closed(e)) => {
            assert_eq!(e, ScaleError::TransportFailure("adapter reset".into()))
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(l.recv_timeout(Duration::from_secs(1)).is_err());
}

#[test]
fn many_listeners_come_and_go() {
    for _ in 0..10 {
        let l = Listener::spawn(
            ScriptedTransport::new(Vec::new()),
            Duration::from_millis(2),
            2,
            MonotonicClock::new(),
        );
        assert!(l.recv_timeout(Duration::from_millis(5)).is_err());
    }
}
