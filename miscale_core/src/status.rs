//! Session status and human-readable status events.
//!
//! [`SessionStatus`] is returned from each ingest step. [`StatusEvent`]s are
//! emitted while a session runs; whoever presents them (console, HTTP stream,
//! log) plugs in a [`StatusSink`]. Emission never blocks the session and never
//! fails.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use crossbeam_channel as xch;
use serde::Serialize;

use crate::error::ScaleError;
use crate::store::FinalizedMeasurement;

/// Public status of a single step of a weigh-in session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    /// Keep going; not settled yet.
    Running,
    /// Payload arrived while the session was not active; nothing happened.
    Ignored,
    /// Settled and persisted.
    Complete(FinalizedMeasurement),
    /// Aborted with a typed error; no further payloads are processed.
    Aborted(ScaleError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Info,
    Progress,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusEvent {
    pub message: String,
    pub level: StatusLevel,
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(level: StatusLevel, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level,
            timestamp: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(StatusLevel::Info, message)
    }

    pub fn progress(message: impl Into<String>) -> Self {
        Self::new(StatusLevel::Progress, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(StatusLevel::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(StatusLevel::Error, message)
    }
}

pub trait StatusSink: Send + Sync {
    fn emit(&self, event: StatusEvent);

    /// Drop anything buffered. Called when a new session starts.
    fn reset(&self) {}
}

impl<S: StatusSink + ?Sized> StatusSink for Arc<S> {
    fn emit(&self, event: StatusEvent) {
        (**self).emit(event)
    }

    fn reset(&self) {
        (**self).reset()
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn emit(&self, _event: StatusEvent) {}
}

/// Forwards events to `tracing` at a level matching the event level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn emit(&self, e: StatusEvent) {
        match e.level {
            StatusLevel::Error => tracing::warn!(target: "miscale::status", "{}", e.message),
            StatusLevel::Progress => tracing::debug!(target: "miscale::status", "{}", e.message),
            StatusLevel::Info | StatusLevel::Success => {
                tracing::info!(target: "miscale::status", "{}", e.message)
            }
        }
    }
}

/// Bounded in-memory queue. When full, the oldest event is dropped so the
/// newest always gets in.
#[derive(Debug, Clone)]
pub struct QueueSink {
    tx: xch::Sender<StatusEvent>,
    rx: xch::Receiver<StatusEvent>,
}

impl QueueSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = xch::bounded(capacity.max(1));
        Self { tx, rx }
    }

    /// Receiver for a consumer (stream endpoint, console printer).
    /// Receivers compete: each event is delivered to one of them.
    pub fn subscribe(&self) -> xch::Receiver<StatusEvent> {
        self.rx.clone()
    }

    /// Take everything currently buffered, oldest first.
    pub fn drain(&self) -> Vec<StatusEvent> {
        self.rx.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl StatusSink for QueueSink {
    fn emit(&self, event: StatusEvent) {
        let mut pending = event;
        // Bounded retry: another producer may refill the slot we just freed.
        for _ in 0..4 {
            match self.tx.try_send(pending) {
                Ok(()) => return,
                Err(xch::TrySendError::Full(e)) => {
                    let _ = self.rx.try_recv();
                    pending = e;
                }
                Err(xch::TrySendError::Disconnected(_)) => return,
            }
        }
        tracing::trace!("status queue contended; event dropped");
    }

    fn reset(&self) {
        while self.rx.try_recv().is_ok() {}
    }
}

/// Sends each event to every inner sink.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn StatusSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl StatusSink for FanoutSink {
    fn emit(&self, event: StatusEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for s in rest {
                s.emit(event.clone());
            }
            last.emit(event);
        }
    }

    fn reset(&self) {
        for s in &self.sinks {
            s.reset();
        }
    }
}

/// Records every event; handy for asserting on what a session said.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<std::sync::Mutex<Vec<StatusEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StatusEvent> {
        self.events
            .lock()
            .map(|v| v.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }

    pub fn levels(&self) -> Vec<StatusLevel> {
        self.events().into_iter().map(|e| e.level).collect()
    }
}

impl StatusSink for RecordingSink {
    fn emit(&self, event: StatusEvent) {
        match self.events.lock() {
            Ok(mut v) => v.push(event),
            Err(p) => p.into_inner().push(event),
        }
    }

    fn reset(&self) {
        match self.events.lock() {
            Ok(mut v) => v.clear(),
            Err(p) => p.into_inner().clear(),
        }
    }
}
