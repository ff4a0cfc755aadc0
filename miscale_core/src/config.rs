//! Runtime configuration for the stability detector and the session runner.
//!
//! These are separate from the TOML-deserialized config in `miscale_config`;
//! see `conversions` for the mapping.

use serde::Serialize;

/// Thresholds deciding when a weigh-in has settled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StabilityCfg {
    /// Window length N: this many consecutive readings must agree.
    pub required_readings: usize,
    /// Maximum `max - min` across the window, inclusive.
    pub weight_tolerance_kg: f64,
    /// The window must stay within tolerance for at least this long.
    pub min_stable_ms: u64,
}

impl Default for StabilityCfg {
    fn default() -> Self {
        Self {
            required_readings: 7,
            weight_tolerance_kg: 0.1,
            min_stable_ms: 3_000,
        }
    }
}

/// Session loop pacing and limits.
#[derive(Debug, Clone)]
pub struct RunnerCfg {
    /// Max wait per channel receive before re-checking the cancel flag (ms).
    pub idle_tick_ms: u64,
    /// Max wait per transport read inside the notification pump (ms).
    pub notify_timeout_ms: u64,
    /// Hard cap on one session; 0 disables.
    pub max_session_ms: u64,
    /// Bound of the notification channel between pump and session.
    pub channel_capacity: usize,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            idle_tick_ms: 200,
            notify_timeout_ms: 1_000,
            max_session_ms: 0,
            channel_capacity: 64,
        }
    }
}
