//! Settle detection for a stream of weight readings.
//!
//! A fixed-size FIFO window of the last N readings must stay within a weight
//! tolerance (inclusive, see [`crate::tolerance`]) for a minimum duration. Any
//! out-of-tolerance window clears the stability clock, so the duration
//! requirement restarts from zero.
//! Once a final reading has been reported the detector latches.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::StabilityCfg;
use crate::tolerance::{exceeds, spread_kg};

/// Outcome of feeding one reading to the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StabilityResult {
    /// Fewer than N readings so far.
    NotEnoughData,
    /// Window spread (kg) exceeds the tolerance; stability clock cleared.
    WeightDrifting(f64),
    /// Window just came within tolerance; stability clock started.
    JustStabilized,
    /// Within tolerance for this long, but not yet for the minimum duration.
    Stabilizing(Duration),
    /// Final reading (kg). Returned once per detector.
    Stable(f64),
    /// A final reading was already reported; the sample was not ingested.
    AlreadyStable,
}

impl StabilityResult {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Stable(_))
    }
}

#[derive(Debug)]
pub struct StabilityDetector {
    cfg: StabilityCfg,
    required: usize,
    tolerance_kg: f64,
    min_stable: Duration,
    window: VecDeque<(f64, Instant)>,
    stable_since: Option<Instant>,
    reported: bool,
}

impl StabilityDetector {
    pub fn new(cfg: StabilityCfg) -> Self {
        let required = cfg.required_readings.max(1);
        Self {
            required,
            tolerance_kg: cfg.weight_tolerance_kg.max(0.0),
            min_stable: Duration::from_millis(cfg.min_stable_ms),
            window: VecDeque::with_capacity(required + 1),
            stable_since: None,
            reported: false,
            cfg,
        }
    }

    /// Feed one reading taken at `now`. `now` must not go backwards within a session.
    pub fn ingest(&mut self, weight_kg: f64, now: Instant) -> StabilityResult {
        if self.reported {
            return StabilityResult::AlreadyStable;
        }

        self.window.push_back((weight_kg, now));
        while self.window.len() > self.required {
            self.window.pop_front();
        }
        if self.window.len() < self.required {
            return StabilityResult::NotEnoughData;
        }

        let spread = self.spread();
        if exceeds(spread, self.tolerance_kg) {
            self.stable_since = None;
            return StabilityResult::WeightDrifting(spread);
        }

        let Some(since) = self.stable_since else {
            self.stable_since = Some(now);
            return StabilityResult::JustStabilized;
        };

        let elapsed = now.saturating_duration_since(since);
        if elapsed < self.min_stable {
            return StabilityResult::Stabilizing(elapsed);
        }

        self.reported = true;
        StabilityResult::Stable(weight_kg)
    }

    fn spread(&self) -> f64 {
        spread_kg(self.window.iter().map(|&(w, _)| w))
    }

    pub fn cfg(&self) -> &StabilityCfg {
        &self.cfg
    }

    /// Readings currently held (at most `required()`).
    pub fn filled(&self) -> usize {
        self.window.len()
    }

    pub fn required(&self) -> usize {
        self.required
    }

    /// Current window spread in kg; `None` until the window is full.
    pub fn spread_kg(&self) -> Option<f64> {
        (self.window.len() >= self.required).then(|| self.spread())
    }

    /// How long the window has been within tolerance as of `now`.
    pub fn stable_for(&self, now: Instant) -> Option<Duration> {
        self.stable_since
            .map(|since| now.saturating_duration_since(since))
    }

    /// Time between the oldest and newest reading in the window.
    pub fn window_span(&self) -> Duration {
        match (self.window.front(), self.window.back()) {
            (Some(&(_, first)), Some(&(_, last))) => last.saturating_duration_since(first),
            _ => Duration::ZERO,
        }
    }

    pub fn min_stable(&self) -> Duration {
        self.min_stable
    }

    /// True once `Stable` has been returned.
    pub fn is_final(&self) -> bool {
        self.reported
    }
}
