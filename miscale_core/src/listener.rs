//! Background notification pump.
//!
//! Spawns a thread that owns the `Transport` and pushes each payload through a
//! bounded channel, stamped with the clock's `now()`. A transport error is
//! forwarded once as `Notification::Closed` and ends the thread.
//!
//! Each `Listener` spawns exactly one thread, which stops the transport and
//! is joined when the `Listener` is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use miscale_traits::{Clock, Transport};

use crate::error::ScaleError;
use crate::hw_error::map_transport_error;

#[derive(Debug)]
pub enum Notification {
    Payload { bytes: Vec<u8>, observed_at: Instant },
    /// The transport failed; no more payloads follow.
    Closed(ScaleError),
}

pub struct Listener {
    rx: xch::Receiver<Notification>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl Listener {
    /// `poll` bounds each `next_payload` call, which is how often the
    /// thread notices shutdown while the scale is quiet.
    pub fn spawn<T, C>(mut transport: T, poll: Duration, capacity: usize, clock: C) -> Self
    where
        T: Transport + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let (tx, rx) = xch::bounded(capacity.max(1));
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let join_handle = std::thread::Builder::new()
            .name("miscale-listener".into())
            .spawn(move || {
                loop {
                    if shutdown_clone.load(Ordering::Relaxed) {
                        tracing::debug!("listener received shutdown signal");
                        break;
                    }
                    match transport.next_payload(poll) {
                        Ok(Some(bytes)) => {
                            let observed_at = clock.now();
                            let msg = Notification::Payload { bytes, observed_at };
                            if tx.send(msg).is_err() {
                                tracing::debug!("listener consumer disconnected, exiting");
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            let mapped = map_transport_error(&*e);
                            tracing::warn!(error = %e, kind = mapped.kind(), "transport failed");
                            let _ = tx.send(Notification::Closed(mapped));
                            break;
                        }
                    }
                }
                if let Err(e) = transport.stop() {
                    tracing::warn!(error = %e, "transport stop failed");
                }
                tracing::trace!("listener thread exiting cleanly");
            });

        let join_handle = match join_handle {
            Ok(h) => Some(h),
            Err(e) => {
                // Surface as a closed stream rather than panicking.
                tracing::error!(error = %e, "failed to spawn listener thread");
                let (tx, rx2) = xch::bounded(1);
                let _ = tx.send(Notification::Closed(ScaleError::TransportFailure(format!(
                    "failed to spawn listener: {e}"
                ))));
                return Self {
                    rx: rx2,
                    shutdown,
                    join_handle: None,
                };
            }
        };

        Self {
            rx,
            shutdown,
            join_handle,
        }
    }

    /// Wait up to `timeout` for the next notification.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Notification, xch::RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // Disconnect the channel so a pump blocked on a full queue wakes up.
        self.rx = xch::never();
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("listener thread joined"),
                Err(e) => tracing::warn!(?e, "listener thread panicked during shutdown"),
            }
        }
    }
}
