//! Type-state builder for `SessionController`.
//!
//! The builder enforces at compile time that a transport factory and a store
//! are provided before `build()` is available. `try_build()` is always
//! available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use miscale_traits::{Clock, MonotonicClock, Transport};

use crate::config::{RunnerCfg, StabilityCfg};
use crate::controller::{SessionController, TransportFactory};
use crate::error::{BuildError, Result};
use crate::status::{StatusSink, TracingSink};
use crate::store::MeasurementStore;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct ControllerBuilder<T, S> {
    factory: Option<TransportFactory>,
    store: Option<Arc<dyn MeasurementStore>>,
    sink: Option<Arc<dyn StatusSink>>,
    stability: Option<StabilityCfg>,
    runner: Option<RunnerCfg>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    _t: PhantomData<T>,
    _s: PhantomData<S>,
}

impl Default for ControllerBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            factory: None,
            store: None,
            sink: None,
            stability: None,
            runner: None,
            clock: None,
            _t: PhantomData,
            _s: PhantomData,
        }
    }
}

fn validate(stability: &StabilityCfg, runner: &RunnerCfg) -> Result<()> {
    if stability.required_readings == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "required_readings must be >= 1",
        )));
    }
    if !stability.weight_tolerance_kg.is_finite() || stability.weight_tolerance_kg < 0.0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "weight_tolerance_kg must be a finite value >= 0",
        )));
    }
    if runner.idle_tick_ms == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "idle_tick_ms must be >= 1",
        )));
    }
    if runner.notify_timeout_ms == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "notify_timeout_ms must be >= 1",
        )));
    }
    if runner.channel_capacity == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "channel_capacity must be >= 1",
        )));
    }
    Ok(())
}

impl<T, S> ControllerBuilder<T, S> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<SessionController> {
        let factory = self
            .factory
            .ok_or_else(|| eyre::Report::new(BuildError::MissingTransport))?;
        let store = self
            .store
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStore))?;
        let stability = self.stability.unwrap_or_default();
        let runner = self.runner.unwrap_or_default();
        validate(&stability, &runner)?;

        Ok(SessionController::from_parts(
            factory,
            store,
            self.sink
                .unwrap_or_else(|| Arc::new(TracingSink) as Arc<dyn StatusSink>),
            stability,
            runner,
            self.clock
                .unwrap_or_else(|| Arc::new(MonotonicClock::new()) as Arc<dyn Clock + Send + Sync>),
        ))
    }

    fn retype<T2, S2>(self) -> ControllerBuilder<T2, S2> {
        ControllerBuilder {
            factory: self.factory,
            store: self.store,
            sink: self.sink,
            stability: self.stability,
            runner: self.runner,
            clock: self.clock,
            _t: PhantomData,
            _s: PhantomData,
        }
    }
}

/// Chainable setters that do not affect type-state.
impl<T, S> ControllerBuilder<T, S> {
    pub fn with_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sink = Some(sink);
        self
    }
    pub fn with_stability(mut self, stability: StabilityCfg) -> Self {
        self.stability = Some(stability);
        self
    }
    pub fn with_runner(mut self, runner: RunnerCfg) -> Self {
        self.runner = Some(runner);
        self
    }
    /// Defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state
impl<S> ControllerBuilder<Missing, S> {
    /// Called once per session to produce a fresh transport.
    pub fn with_transport<F>(self, factory: F) -> ControllerBuilder<Set, S>
    where
        F: Fn() -> Result<Box<dyn Transport + Send>> + Send + Sync + 'static,
    {
        let mut next = self.retype::<Set, S>();
        let factory: TransportFactory = Arc::new(factory);
        next.factory = Some(factory);
        next
    }
}

impl<T> ControllerBuilder<T, Missing> {
    pub fn with_store(self, store: Arc<dyn MeasurementStore>) -> ControllerBuilder<T, Set> {
        let mut next = self.retype::<T, Set>();
        next.store = Some(store);
        next
    }
}

impl ControllerBuilder<Set, Set> {
    /// Validate and build. Only available when transport and store are set.
    pub fn build(self) -> Result<SessionController> {
        self.try_build()
    }
}
