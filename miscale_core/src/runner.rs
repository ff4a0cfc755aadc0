use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use miscale_traits::{Clock, Transport};

use crate::config::RunnerCfg;
use crate::error::{Report, Result as CoreResult, ScaleError};
use crate::hw_error::map_transport_error;
use crate::listener::{Listener, Notification};
use crate::session::Session;
use crate::status::{SessionStatus, StatusEvent, StatusSink};
use crate::store::{FinalizedMeasurement, MeasurementStore};

/// Abort `session` with `err` and wrap it for the caller.
fn abort(session: &mut Session, err: ScaleError, sink: &dyn StatusSink) -> Report {
    session.abort(err.clone(), sink);
    Report::new(err)
}

/// Drive one session to completion on the calling thread.
///
/// Connects the transport, hands it to a [`Listener`], then feeds payloads to
/// `session` until it completes, the transport fails, `cancel` is raised, or
/// `cfg.max_session_ms` elapses. The transport is stopped on every exit path
/// when the listener is dropped.
#[allow(clippy::too_many_arguments)]
pub fn run_session<T, C>(
    mut transport: T,
    session: &mut Session,
    target: Option<&str>,
    cfg: &RunnerCfg,
    sink: &dyn StatusSink,
    store: &dyn MeasurementStore,
    cancel: &AtomicBool,
    clock: C,
) -> CoreResult<FinalizedMeasurement>
where
    T: Transport + Send + 'static,
    C: Clock + Clone + Send + Sync + 'static,
{
    if cancel.load(Ordering::Acquire) {
        return Err(abort(session, ScaleError::Cancelled, sink));
    }

    sink.emit(StatusEvent::info(match target {
        Some(t) => format!("Connecting to scale {t}..."),
        None => "Searching for scale...".to_string(),
    }));
    let device = match transport.connect(target) {
        Ok(d) => d,
        Err(e) => {
            let mapped = map_transport_error(&*e);
            let _ = transport.stop();
            return Err(abort(session, mapped, sink));
        }
    };
    session.activate(device.clone());
    tracing::info!(device = %device, "scale connected");
    sink.emit(StatusEvent::info(format!(
        "Connected to {device}. Step on the scale..."
    )));

    let listener = Listener::spawn(
        transport,
        Duration::from_millis(cfg.notify_timeout_ms.max(1)),
        cfg.channel_capacity,
        clock.clone(),
    );
    let started = clock.now();
    let idle = Duration::from_millis(cfg.idle_tick_ms.max(1));

    loop {
        if cancel.load(Ordering::Acquire) {
            return Err(abort(session, ScaleError::Cancelled, sink));
        }
        if cfg.max_session_ms > 0 && clock.ms_since(started) >= cfg.max_session_ms {
            return Err(abort(
                session,
                ScaleError::TransportFailure("session timed out".into()),
                sink,
            ));
        }

        match listener.recv_timeout(idle) {
            Ok(Notification::Payload { bytes, observed_at }) => {
                match session.on_payload(&bytes, observed_at, sink, store) {
                    SessionStatus::Running | SessionStatus::Ignored => continue,
                    SessionStatus::Complete(m) => {
                        tracing::info!(weight_kg = m.weight, "session complete");
                        return Ok(m);
                    }
                    SessionStatus::Aborted(e) => {
                        tracing::error!(error = %e, "session aborted");
                        return Err(Report::new(e));
                    }
                }
            }
            Ok(Notification::Closed(e)) => return Err(abort(session, e, sink)),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                return Err(abort(
                    session,
                    ScaleError::TransportFailure("notification stream closed".into()),
                    sink,
                ));
            }
        }
    }
}
