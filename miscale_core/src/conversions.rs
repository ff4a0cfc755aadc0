//! Conversions bridging `miscale_config` types to `miscale_core` types.

use crate::config::{RunnerCfg, StabilityCfg};
use crate::error::ScaleError;
use crate::profile::UserProfile;

// ── StabilityCfg ─────────────────────────────────────────────────────────────

impl From<&miscale_config::StabilityCfg> for StabilityCfg {
    fn from(c: &miscale_config::StabilityCfg) -> Self {
        Self {
            required_readings: c.required_readings,
            weight_tolerance_kg: c.weight_tolerance_kg,
            min_stable_ms: c.min_stable_ms,
        }
    }
}

// ── RunnerCfg ────────────────────────────────────────────────────────────────

/// Runner pacing draws from `[runner]` and `[scale]`.
impl From<&miscale_config::Config> for RunnerCfg {
    fn from(c: &miscale_config::Config) -> Self {
        Self {
            idle_tick_ms: c.runner.idle_tick_ms,
            notify_timeout_ms: c.scale.notify_timeout_ms,
            max_session_ms: c.runner.max_session_ms,
            channel_capacity: c.runner.channel_capacity,
        }
    }
}

// ── UserProfile ──────────────────────────────────────────────────────────────

impl TryFrom<&miscale_config::ProfileCfg> for UserProfile {
    type Error = ScaleError;

    fn try_from(c: &miscale_config::ProfileCfg) -> Result<Self, Self::Error> {
        Self::parse(c.age, c.height_cm, &c.gender)
    }
}
