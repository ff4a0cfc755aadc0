#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the weigh-in system.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - Every section has defaults, so an empty file is a valid config.
//! - `Config::apply_env` layers the legacy environment variables on top.
use std::path::Path;

use eyre::WrapErr;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ScaleCfg {
    /// MAC address of the scale; absent means scan for the first scale advertising
    /// the body composition service.
    pub address: Option<String>,
    pub scan_timeout_ms: u64,
    /// Max wait per notification read before the pump re-checks for shutdown.
    pub notify_timeout_ms: u64,
}

impl Default for ScaleCfg {
    fn default() -> Self {
        Self {
            address: None,
            scan_timeout_ms: 10_000,
            notify_timeout_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProfileCfg {
    pub age: i64,
    pub height_cm: f64,
    pub gender: String,
}

impl Default for ProfileCfg {
    fn default() -> Self {
        Self {
            age: 25,
            height_cm: 178.0,
            gender: "male".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StabilityCfg {
    pub required_readings: usize,
    pub weight_tolerance_kg: f64,
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

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RunnerCfg {
    pub idle_tick_ms: u64,
    /// Hard cap on one session (0 = unlimited).
    pub max_session_ms: u64,
    pub channel_capacity: usize,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            idle_tick_ms: 200,
            max_session_ms: 0,
            channel_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StatusCfg {
    /// Buffered status events; the oldest is dropped on overflow.
    pub queue_capacity: usize,
}

impl Default for StatusCfg {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StoreCfg {
    /// SQLite database file.
    pub path: String,
}

impl Default for StoreCfg {
    fn default() -> Self {
        Self {
            path: "measurements.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SimulatorCfg {
    pub weight_kg: f64,
    pub impedance: u16,
    /// Notifications per second; 0 emits without pacing.
    pub rate_hz: u32,
    pub ramp_samples: usize,
    pub wobble_samples: usize,
    /// Simulate a disconnect after this many notifications.
    pub fail_after: Option<usize>,
    /// Simulate a scale that never answers the connect request.
    pub unresponsive: bool,
}

impl Default for SimulatorCfg {
    fn default() -> Self {
        Self {
            weight_kg: 70.0,
            impedance: 500,
            rate_hz: 10,
            ramp_samples: 5,
            wobble_samples: 4,
            fail_after: None,
            unresponsive: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub scale: ScaleCfg,
    pub profile: ProfileCfg,
    pub stability: StabilityCfg,
    pub runner: RunnerCfg,
    pub status: StatusCfg,
    pub store: StoreCfg,
    pub logging: Logging,
    pub simulator: SimulatorCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse, and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading config {}", path.display()))?;
    let cfg = load_toml(&text).wrap_err_with(|| format!("parsing config {}", path.display()))?;
    cfg.validate()
        .wrap_err_with(|| format!("validating config {}", path.display()))?;
    Ok(cfg)
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> eyre::Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| eyre::eyre!("environment variable {name}={raw:?} is invalid: {e}"))
}

impl Config {
    /// Override fields from environment variables, looked up through `lookup`.
    ///
    /// Recognized: `SCALE_MAC`, `AGE`, `HEIGHT_CM`, `GENDER`,
    /// `STABLE_READINGS_REQUIRED`, `WEIGHT_TOLERANCE`,
    /// `MIN_STABLE_DURATION_SECONDS`, `DB_PATH`. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> eyre::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SCALE_MAC") {
            self.scale.address = Some(v.trim().to_string());
        }
        if let Some(v) = get("AGE") {
            self.profile.age = parse_env("AGE", &v)?;
        }
        if let Some(v) = get("HEIGHT_CM") {
            self.profile.height_cm = parse_env("HEIGHT_CM", &v)?;
        }
        if let Some(v) = get("GENDER") {
            self.profile.gender = v.trim().to_string();
        }
        if let Some(v) = get("STABLE_READINGS_REQUIRED") {
            self.stability.required_readings = parse_env("STABLE_READINGS_REQUIRED", &v)?;
        }
        if let Some(v) = get("WEIGHT_TOLERANCE") {
            self.stability.weight_tolerance_kg = parse_env("WEIGHT_TOLERANCE", &v)?;
        }
        if let Some(v) = get("MIN_STABLE_DURATION_SECONDS") {
            let secs: f64 = parse_env("MIN_STABLE_DURATION_SECONDS", &v)?;
            if !(secs.is_finite() && secs >= 0.0) {
                eyre::bail!("MIN_STABLE_DURATION_SECONDS must be >= 0, got {secs}");
            }
            self.stability.min_stable_ms = (secs * 1000.0).round() as u64;
        }
        if let Some(v) = get("DB_PATH") {
            self.store.path = v.trim().to_string();
        }
        Ok(())
    }

    /// `apply_env` against the process environment.
    pub fn apply_process_env(&mut self) -> eyre::Result<()> {
        self.apply_env(|k| std::env::var(k).ok())
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Scale
        if let Some(addr) = &self.scale.address
            && addr.trim().is_empty()
        {
            eyre::bail!("scale.address must not be empty when set");
        }
        if self.scale.scan_timeout_ms == 0 {
            eyre::bail!("scale.scan_timeout_ms must be >= 1");
        }
        if self.scale.notify_timeout_ms == 0 {
            eyre::bail!("scale.notify_timeout_ms must be >= 1");
        }

        // Profile
        if self.profile.age <= 0 {
            eyre::bail!("profile.age must be > 0");
        }
        if self.profile.age > 150 {
            eyre::bail!("profile.age is unreasonably large (>150)");
        }
        if !(self.profile.height_cm.is_finite() && self.profile.height_cm > 0.0) {
            eyre::bail!("profile.height_cm must be > 0");
        }
        if !matches!(
            self.profile.gender.trim().to_ascii_lowercase().as_str(),
            "male" | "female"
        ) {
            eyre::bail!("profile.gender must be \"male\" or \"female\"");
        }

        // Stability
        if self.stability.required_readings == 0 {
            eyre::bail!("stability.required_readings must be >= 1");
        }
        if self.stability.required_readings > 10_000 {
            eyre::bail!("stability.required_readings is unreasonably large (>10000)");
        }
        if !(self.stability.weight_tolerance_kg.is_finite()
            && self.stability.weight_tolerance_kg >= 0.0)
        {
            eyre::bail!("stability.weight_tolerance_kg must be >= 0");
        }
        if self.stability.weight_tolerance_kg > 10.0 {
            eyre::bail!("stability.weight_tolerance_kg is unreasonably large (>10kg)");
        }
        if self.stability.min_stable_ms > 5 * 60 * 1000 {
            eyre::bail!("stability.min_stable_ms is unreasonably large (>5min)");
        }

        // Runner
        if self.runner.idle_tick_ms == 0 {
            eyre::bail!("runner.idle_tick_ms must be >= 1");
        }
        if self.runner.channel_capacity == 0 {
            eyre::bail!("runner.channel_capacity must be >= 1");
        }

        // Status
        if self.status.queue_capacity == 0 {
            eyre::bail!("status.queue_capacity must be >= 1");
        }

        // Store
        if self.store.path.trim().is_empty() {
            eyre::bail!("store.path must not be empty");
        }

        // Logging
        if let Some(r) = &self.logging.rotation
            && !matches!(r.as_str(), "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly");
        }

        // Simulator
        if !(self.simulator.weight_kg.is_finite()
            && self.simulator.weight_kg > 0.0
            && self.simulator.weight_kg < 327.0)
        {
            eyre::bail!("simulator.weight_kg must be in (0, 327)");
        }

        Ok(())
    }
}
