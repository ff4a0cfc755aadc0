#[cfg(feature = "ble")]
pub mod ble;
pub mod error;

use std::time::{Duration, Instant};

use error::HwError;
use miscale_traits::{Transport, TransportError, frame};

/// Bluetooth SIG Body Composition service advertised by the scale.
pub const BODY_COMPOSITION_SERVICE_UUID: &str = "0000181b-0000-1000-8000-00805f9b34fb";
/// Body Composition Measurement characteristic carrying the weight/impedance frames.
pub const MEASUREMENT_CHARACTERISTIC_UUID: &str = "00002a9c-0000-1000-8000-00805f9b34fb";

/// Frame length emitted by the scale for one measurement notification.
pub const FRAME_LEN: usize = frame::MIN_PAYLOAD_LEN;

/// Build one notification frame the way the scale lays it out on the wire.
pub fn frame(weight_kg: f64, impedance: u16) -> Vec<u8> {
    frame::encode(weight_kg, impedance).to_vec()
}

/// Parameters for the simulated weigh-in.
#[derive(Debug, Clone)]
pub struct SimProfile {
    /// Final settled weight.
    pub weight_kg: f64,
    pub impedance: u16,
    /// Notification rate; 0 emits back-to-back without pacing.
    pub rate_hz: u32,
    /// Samples spent climbing from empty to the final weight.
    pub ramp_samples: usize,
    /// Samples of out-of-tolerance swaying after the ramp.
    pub wobble_samples: usize,
    /// Report a disconnect after this many payloads.
    pub fail_after: Option<usize>,
    /// Never answer the connect request; `connect` fails with a timeout.
    pub unresponsive: bool,
    /// Identifier reported by `connect` when no target is given.
    pub device_id: String,
}

impl Default for SimProfile {
    fn default() -> Self {
        Self {
            weight_kg: 70.0,
            impedance: 500,
            rate_hz: 10,
            ramp_samples: 5,
            wobble_samples: 4,
            fail_after: None,
            unresponsive: false,
            device_id: "SIM:00:00:00:00:01".to_string(),
        }
    }
}

/// Simulated scale: replays a ramp, a sway, then a settled weight with sub-tolerance jitter.
pub struct SimulatedScale {
    profile: SimProfile,
    emitted: usize,
    connected: bool,
    next_due: Option<Instant>,
}

impl SimulatedScale {
    pub fn new(profile: SimProfile) -> Self {
        Self {
            profile,
            emitted: 0,
            connected: false,
            next_due: None,
        }
    }

    /// Payloads produced so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    fn weight_at(&self, i: usize) -> f64 {
        let p = &self.profile;
        if i < p.ramp_samples {
            return p.weight_kg * (i + 1) as f64 / (p.ramp_samples + 1) as f64;
        }
        let j = i - p.ramp_samples;
        if j < p.wobble_samples {
            let amp = 0.6 * (p.wobble_samples - j) as f64 / p.wobble_samples as f64;
            let sign = if j % 2 == 0 { 1.0 } else { -1.0 };
            return p.weight_kg + sign * amp.max(0.2);
        }
        // settled: alternate by one quantization step (5 g)
        if j % 2 == 0 {
            p.weight_kg
        } else {
            p.weight_kg + 0.005
        }
    }

    /// Wait for the next pacing slot. Returns false when it does not fall within `timeout`.
    fn pace(&mut self, timeout: Duration) -> bool {
        if self.profile.rate_hz == 0 {
            return true;
        }
        let period = Duration::from_secs_f64(1.0 / f64::from(self.profile.rate_hz));
        let now = Instant::now();
        let due = *self.next_due.get_or_insert(now + period);
        if due > now + timeout {
            std::thread::sleep(timeout);
            return false;
        }
        std::thread::sleep(due.saturating_duration_since(now));
        self.next_due = Some(due + period);
        true
    }
}

impl Default for SimulatedScale {
    fn default() -> Self {
        Self::new(SimProfile::default())
    }
}

impl Transport for SimulatedScale {
    fn connect(&mut self, target: Option<&str>) -> Result<String, TransportError> {
        if self.profile.unresponsive {
            return Err(Box::new(HwError::Timeout));
        }
        let id = target.map_or_else(|| self.profile.device_id.clone(), str::to_string);
        tracing::info!(device = %id, "connected to scale (simulated)");
        self.connected = true;
        Ok(id)
    }

    fn next_payload(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, TransportError> {
        if !self.connected {
            return Err(Box::new(HwError::NotConnected));
        }
        if let Some(limit) = self.profile.fail_after
            && self.emitted >= limit
        {
            self.connected = false;
            return Err(Box::new(HwError::Disconnected));
        }
        if !self.pace(timeout) {
            return Ok(None);
        }
        let w = self.weight_at(self.emitted);
        self.emitted += 1;
        tracing::trace!(weight_kg = w, n = self.emitted, "simulated notification");
        Ok(Some(frame(w, self.profile.impedance)))
    }

    fn stop(&mut self) -> Result<(), TransportError> {
        if self.connected {
            tracing::debug!("scale disconnected (simulated)");
        }
        self.connected = false;
        Ok(())
    }
}
