//! Test and helper mocks for miscale_core

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use miscale_traits::{Clock, Transport, TransportError};

use crate::error::Result;
use crate::store::{FinalizedMeasurement, MeasurementStore, StoredMeasurement};

/// What a [`ScriptedTransport`] does once its frames run out.
#[derive(Debug, Clone)]
pub enum ScriptEnd {
    /// Report "nothing arrived" forever.
    Idle,
    /// Fail with this message.
    Fail(String),
}

/// Replays a fixed list of frames.
///
/// With a clock attached, `clock.sleep(step)` runs before each frame, so a
/// shared `TestClock` moves forward by `step` per notification.
pub struct ScriptedTransport {
    frames: VecDeque<Vec<u8>>,
    step: Duration,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    end: ScriptEnd,
    connect_error: Option<String>,
    stopped: Arc<AtomicBool>,
    stop_calls: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new(frames: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            step: Duration::ZERO,
            clock: None,
            end: ScriptEnd::Idle,
            connect_error: None,
            stopped: Arc::new(AtomicBool::new(false)),
            stop_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Frames for a list of weights, all at the same impedance.
    pub fn from_weights(weights: &[f64], impedance: u16) -> Self {
        Self::new(
            weights
                .iter()
                .map(|&w| crate::decoder::encode(w, impedance).to_vec()),
        )
    }

    pub fn paced(mut self, clock: Arc<dyn Clock + Send + Sync>, step: Duration) -> Self {
        self.clock = Some(clock);
        self.step = step;
        self
    }

    pub fn then(mut self, end: ScriptEnd) -> Self {
        self.end = end;
        self
    }

    pub fn failing_connect(mut self, msg: impl Into<String>) -> Self {
        self.connect_error = Some(msg.into());
        self
    }

    /// Set once `stop()` has been called.
    pub fn stopped_flag(&self) -> Arc<AtomicBool> {
        self.stopped.clone()
    }

    pub fn stop_calls(&self) -> Arc<AtomicUsize> {
        self.stop_calls.clone()
    }
}

impl Transport for ScriptedTransport {
    fn connect(&mut self, target: Option<&str>) -> std::result::Result<String, TransportError> {
        if let Some(msg) = &self.connect_error {
            return Err(msg.clone().into());
        }
        Ok(target.unwrap_or("SCRIPTED").to_string())
    }

    fn next_payload(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Option<Vec<u8>>, TransportError> {
        if self.stopped.load(Ordering::Relaxed) {
            return Err("transport stopped".into());
        }
        match self.frames.pop_front() {
            Some(f) => {
                if let Some(c) = &self.clock {
                    c.sleep(self.step);
                }
                Ok(Some(f))
            }
            None => match &self.end {
                ScriptEnd::Idle => {
                    std::thread::sleep(timeout.min(Duration::from_millis(2)));
                    Ok(None)
                }
                ScriptEnd::Fail(msg) => Err(msg.clone().into()),
            },
        }
    }

    fn stop(&mut self) -> std::result::Result<(), TransportError> {
        self.stopped.store(true, Ordering::Relaxed);
        self.stop_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// A store whose writes always fail.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingStore;

impl MeasurementStore for FailingStore {
    fn write(&self, _m: &FinalizedMeasurement) -> Result<i64> {
        Err(eyre::eyre!("disk full"))
    }

    fn query(&self, _limit: Option<usize>) -> Result<Vec<StoredMeasurement>> {
        Ok(Vec::new())
    }
}
