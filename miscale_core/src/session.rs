//! One weigh-in: decoder, stability detector, and the single-write guard.
//!
//! A `Session` is owned by exactly one worker. It does not touch the transport;
//! the runner feeds it payloads and reacts to the returned [`SessionStatus`].

use std::time::Instant;

use chrono::Utc;

use crate::config::StabilityCfg;
use crate::decoder::{self, Sample};
use crate::error::ScaleError;
use crate::profile::UserProfile;
use crate::stability::{StabilityDetector, StabilityResult};
use crate::status::{SessionStatus, StatusEvent, StatusSink};
use crate::store::{FinalizedMeasurement, MeasurementStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
    Finalized,
    Aborted,
}

#[derive(Debug)]
pub struct Session {
    profile: UserProfile,
    detector: StabilityDetector,
    state: SessionState,
    finalized: bool,
    device: Option<String>,
    last_impedance: u16,
}

impl Session {
    /// Fails with `InvalidProfile` if the profile does not validate.
    pub fn new(profile: UserProfile, stability: StabilityCfg) -> Result<Self, ScaleError> {
        profile.validate()?;
        Ok(Self {
            profile,
            detector: StabilityDetector::new(stability),
            state: SessionState::Idle,
            finalized: false,
            device: None,
            last_impedance: 0,
        })
    }

    /// Idle -> Active once the transport is connected.
    pub fn activate(&mut self, device: impl Into<String>) {
        if self.state == SessionState::Idle {
            self.device = Some(device.into());
            self.state = SessionState::Active;
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn detector(&self) -> &StabilityDetector {
        &self.detector
    }

    /// Decode and process one raw notification.
    ///
    /// Malformed payloads are reported and dropped; the session keeps running.
    pub fn on_payload(
        &mut self,
        raw: &[u8],
        observed_at: Instant,
        sink: &dyn StatusSink,
        store: &dyn MeasurementStore,
    ) -> SessionStatus {
        if self.state != SessionState::Active {
            return SessionStatus::Ignored;
        }
        match decoder::decode(raw, observed_at) {
            Ok(sample) => self.on_sample(sample, sink, store),
            Err(e) => {
                tracing::warn!(len = raw.len(), error = %e, "dropping malformed payload");
                sink.emit(StatusEvent::error(format!("Ignored malformed reading: {e}")));
                SessionStatus::Running
            }
        }
    }

    /// Process one decoded sample.
    pub fn on_sample(
        &mut self,
        sample: Sample,
        sink: &dyn StatusSink,
        store: &dyn MeasurementStore,
    ) -> SessionStatus {
        if self.state != SessionState::Active {
            return SessionStatus::Ignored;
        }
        self.last_impedance = sample.impedance;
        let w = sample.weight_kg;
        let result = self.detector.ingest(w, sample.observed_at);
        tracing::trace!(weight_kg = w, impedance = sample.impedance, ?result, "sample");

        match result {
            StabilityResult::Stable(weight) => self.finalize(weight, sink, store),
            StabilityResult::AlreadyStable => SessionStatus::Running,
            other => {
                sink.emit(StatusEvent::progress(self.progress_message(
                    other,
                    w,
                    sample.observed_at,
                )));
                SessionStatus::Running
            }
        }
    }

    fn progress_message(&self, result: StabilityResult, weight: f64, now: Instant) -> String {
        let d = &self.detector;
        let (n, required) = (d.filled(), d.required());
        let min_s = d.min_stable().as_secs_f64();
        match result {
            StabilityResult::NotEnoughData => format!(
                "Collecting readings... ({n}/{required} readings, weight: {weight:.2} kg)"
            ),
            StabilityResult::WeightDrifting(spread) => format!(
                "Weight fluctuating... (spread {spread:.3} kg > {:.3} kg, weight: {weight:.2} kg)",
                d.cfg().weight_tolerance_kg
            ),
            StabilityResult::JustStabilized | StabilityResult::Stabilizing(_) => {
                let held = d.stable_for(now).unwrap_or_default().as_secs_f64();
                format!(
                    "Stabilizing measurement... ({n}/{required} readings, stable for {held:.1}/{min_s:.1}s, weight: {weight:.2} kg)"
                )
            }
            StabilityResult::Stable(_) | StabilityResult::AlreadyStable => {
                format!("Weight: {weight:.2} kg")
            }
        }
    }

    fn finalize(
        &mut self,
        weight: f64,
        sink: &dyn StatusSink,
        store: &dyn MeasurementStore,
    ) -> SessionStatus {
        if self.finalized {
            return SessionStatus::Running;
        }
        // Set before the write: a failed write is not retried.
        self.finalized = true;

        let m = FinalizedMeasurement::new(weight, self.last_impedance, &self.profile, Utc::now());
        match store.write(&m) {
            Ok(id) => {
                tracing::info!(
                    id,
                    weight_kg = m.weight,
                    bmi = m.bmi,
                    body_fat = m.body_fat_percentage,
                    "measurement finalized"
                );
                sink.emit(StatusEvent::success(format!(
                    "Measurement complete: {:.2} kg, BMI {:.1}, BMR {:.0} kcal, body fat {:.1}%",
                    m.weight, m.bmi, m.bmr, m.body_fat_percentage
                )));
                self.state = SessionState::Finalized;
                SessionStatus::Complete(m)
            }
            Err(e) => {
                let err = ScaleError::PersistenceFailure(format!("{e:#}"));
                tracing::error!(error = %err, "failed to save measurement");
                sink.emit(StatusEvent::error(format!("Failed to save measurement: {e}")));
                self.state = SessionState::Aborted;
                SessionStatus::Aborted(err)
            }
        }
    }

    /// Move to `Aborted` unless already terminal. A user stop (`Cancelled`)
    /// is reported as info, anything else as error.
    pub fn abort(&mut self, err: ScaleError, sink: &dyn StatusSink) -> SessionStatus {
        if matches!(self.state, SessionState::Finalized | SessionState::Aborted) {
            return SessionStatus::Ignored;
        }
        self.state = SessionState::Aborted;
        match &err {
            ScaleError::Cancelled => {
                tracing::info!("session stopped by user");
                sink.emit(StatusEvent::info("Measurement stopped"));
            }
            other => {
                tracing::warn!(error = %other, kind = other.kind(), "session aborted");
                sink.emit(StatusEvent::error(format!("Measurement failed: {other}")));
            }
        }
        SessionStatus::Aborted(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Gender;
    use crate::status::{NullSink, RecordingSink, StatusLevel};
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn session(n: usize, ms: u64) -> Session {
        let p = UserProfile::new(30, 178.0, Gender::Male).unwrap();
        Session::new(
            p,
            StabilityCfg {
                required_readings: n,
                weight_tolerance_kg: 0.1,
                min_stable_ms: ms,
            },
        )
        .unwrap()
    }

    #[test]
    fn idle_session_ignores_payloads() {
        let mut s = session(1, 0);
        let store = MemoryStore::new();
        let raw = decoder::encode(70.0, 500);
        assert_eq!(
            s.on_payload(&raw, Instant::now(), &NullSink, &store),
            SessionStatus::Ignored
        );
        assert_eq!(s.state(), SessionState::Idle);
    }

    #[test]
    fn malformed_payload_keeps_running() {
        let mut s = session(1, 0);
        s.activate("dev");
        let sink = RecordingSink::new();
        let store = MemoryStore::new();
        let st = s.on_payload(&[1, 2, 3], Instant::now(), &sink, &store);
        assert_eq!(st, SessionStatus::Running);
        assert_eq!(sink.levels(), vec![StatusLevel::Error]);
        assert_eq!(s.state(), SessionState::Active);
    }

    #[test]
    fn abort_after_finalize_is_ignored() {
        let mut s = session(1, 0);
        s.activate("dev");
        let store = MemoryStore::new();
        let t0 = Instant::now();
        let raw = decoder::encode(70.0, 500);
        s.on_payload(&raw, t0, &NullSink, &store);
        let st = s.on_payload(&raw, t0 + Duration::from_millis(1), &NullSink, &store);
        assert!(matches!(st, SessionStatus::Complete(_)));
        assert_eq!(s.abort(ScaleError::Cancelled, &NullSink), SessionStatus::Ignored);
        assert_eq!(s.state(), SessionState::Finalized);
    }
}
