#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core weigh-in logic (transport-agnostic).
//!
//! All scale interaction goes through `miscale_traits::Transport`; persistence
//! goes through [`store::MeasurementStore`].
//!
//! ## Architecture
//!
//! - **Decoding**: raw notification frame to `Sample` (`decoder` module)
//! - **Stability**: windowed settle detection with a duration requirement (`stability`)
//! - **Session**: one weigh-in with a single-write guard (`session`)
//! - **Runner**: drives a session from a background notification pump (`runner`, `listener`)
//! - **Controller**: start/stop/status lifecycle, one live session at a time (`controller`)
//! - **Metrics**: BMI, BMR, body fat estimates (`metrics`)

pub mod builder;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod decoder;
pub mod error;
pub mod hw_error;
pub mod listener;
pub mod metrics;
pub mod mocks;
pub mod profile;
pub mod runner;
pub mod session;
pub mod stability;
pub mod status;
pub mod store;
pub mod tolerance;

pub use builder::{ControllerBuilder, Missing, Set};
pub use config::{RunnerCfg, StabilityCfg};
pub use controller::{ControllerStatus, Health, SessionController, SessionOutcome};
pub use decoder::{Sample, decode, encode};
pub use error::{BuildError, Report, Result, ScaleError};
pub use metrics::BodyMetrics;
pub use profile::{Gender, UserProfile};
pub use runner::run_session;
pub use session::{Session, SessionState};
pub use stability::{StabilityDetector, StabilityResult};
pub use status::{
    FanoutSink, NullSink, QueueSink, RecordingSink, SessionStatus, StatusEvent, StatusLevel,
    StatusSink, TracingSink,
};
pub use store::{FinalizedMeasurement, MeasurementStore, MemoryStore, StoredMeasurement};
