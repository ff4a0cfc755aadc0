//! Lifecycle of weigh-in sessions: at most one live at a time.
//!
//! The controller owns the single active session handle behind a mutex. Each
//! session runs [`run_session`] on its own worker thread; `stop` raises the
//! cancel flag and joins that thread, so two sessions never overlap.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use crossbeam_channel as xch;
use miscale_traits::{Clock, Transport};
use serde::{Serialize, Serializer};

use crate::builder::{ControllerBuilder, Missing};
use crate::config::{RunnerCfg, StabilityCfg};
use crate::error::{Report, Result, ScaleError};
use crate::profile::UserProfile;
use crate::runner::run_session;
use crate::session::Session;
use crate::status::{StatusEvent, StatusSink};
use crate::store::{FinalizedMeasurement, MeasurementStore};

/// Produces a fresh transport for each session.
pub type TransportFactory =
    Arc<dyn Fn() -> Result<Box<dyn Transport + Send>> + Send + Sync + 'static>;

/// How a session ended.
pub type SessionOutcome = std::result::Result<FinalizedMeasurement, ScaleError>;

fn ser_error<S: Serializer>(e: &Option<ScaleError>, s: S) -> std::result::Result<S::Ok, S::Error> {
    match e {
        Some(e) => s.serialize_str(&e.to_string()),
        None => s.serialize_none(),
    }
}

/// Snapshot returned by [`SessionController::status`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ControllerStatus {
    pub running: bool,
    pub last_measurement: Option<FinalizedMeasurement>,
    #[serde(serialize_with = "ser_error")]
    pub last_error: Option<ScaleError>,
    pub device: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Published {
    status: ControllerStatus,
    finished_generation: u64,
    last_outcome: Option<SessionOutcome>,
}

struct Active {
    generation: u64,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    done: xch::Receiver<()>,
}

pub struct SessionController {
    factory: TransportFactory,
    store: Mutex<Arc<dyn MeasurementStore>>,
    sink: Arc<dyn StatusSink>,
    stability: StabilityCfg,
    runner: RunnerCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    active: Mutex<Option<Active>>,
    published: Arc<Mutex<Published>>,
    generation: Arc<AtomicU64>,
}

impl core::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionController")
            .field("stability", &self.stability)
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionController {
    pub fn builder() -> ControllerBuilder<Missing, Missing> {
        ControllerBuilder::default()
    }

    pub(crate) fn from_parts(
        factory: TransportFactory,
        store: Arc<dyn MeasurementStore>,
        sink: Arc<dyn StatusSink>,
        stability: StabilityCfg,
        runner: RunnerCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            factory,
            store: Mutex::new(store),
            sink,
            stability,
            runner,
            clock,
            active: Mutex::new(None),
            published: Arc::new(Mutex::new(Published::default())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Begin a new session.
    ///
    /// Fails with `InvalidProfile` before anything else happens, or with
    /// `SessionAlreadyRunning` while another session is live.
    pub fn start(&self, profile: UserProfile, target: Option<&str>) -> Result<()> {
        let mut slot = lock(&self.active);
        if self.is_live(&slot) {
            return Err(Report::new(ScaleError::SessionAlreadyRunning));
        }
        self.start_locked(&mut slot, profile, target)
    }

    /// Stop the live session, if any, and wait for its worker to exit.
    /// Always succeeds.
    pub fn stop(&self) {
        let mut slot = lock(&self.active);
        Self::stop_locked(&mut slot);
    }

    /// Stop whatever is running, then start a new session.
    pub fn restart(&self, profile: UserProfile, target: Option<&str>) -> Result<()> {
        profile.validate().map_err(Report::new)?;
        let mut slot = lock(&self.active);
        Self::stop_locked(&mut slot);
        self.start_locked(&mut slot, profile, target)
    }

    pub fn status(&self) -> ControllerStatus {
        lock(&self.published).status.clone()
    }

    /// Stability thresholds sessions are started with.
    pub fn config(&self) -> StabilityCfg {
        self.stability.clone()
    }

    pub fn health(&self) -> Health {
        Health {
            status: "healthy",
            timestamp: Utc::now(),
        }
    }

    /// Replace the store used by subsequent sessions.
    pub fn set_store(&self, store: Arc<dyn MeasurementStore>) {
        *lock(&self.store) = store;
    }

    pub fn store(&self) -> Arc<dyn MeasurementStore> {
        lock(&self.store).clone()
    }

    /// Block until the current session ends and return its outcome.
    /// `None` if no session was started or it was superseded.
    pub fn wait(&self) -> Option<SessionOutcome> {
        let (generation, done) = {
            let slot = lock(&self.active);
            let a = slot.as_ref()?;
            (a.generation, a.done.clone())
        };
        // Disconnects when the worker drops its sender.
        let _ = done.recv();
        let p = lock(&self.published);
        if p.finished_generation == generation {
            p.last_outcome.clone()
        } else {
            None
        }
    }

    fn is_live(&self, slot: &Option<Active>) -> bool {
        slot.as_ref()
            .is_some_and(|a| a.handle.as_ref().is_some_and(|h| !h.is_finished()))
            && lock(&self.published).status.running
    }

    fn stop_locked(slot: &mut Option<Active>) {
        let Some(mut a) = slot.take() else {
            return;
        };
        a.cancel.store(true, Ordering::Release);
        if let Some(h) = a.handle.take() {
            if h.join().is_err() {
                tracing::warn!(generation = a.generation, "session worker panicked");
            }
        }
        tracing::debug!(generation = a.generation, "session stopped");
    }

    fn start_locked(
        &self,
        slot: &mut Option<Active>,
        profile: UserProfile,
        target: Option<&str>,
    ) -> Result<()> {
        let mut session = Session::new(profile, self.stability.clone()).map_err(Report::new)?;
        // Reap a finished worker before replacing it.
        Self::stop_locked(slot);

        let transport = (self.factory)()
            .map_err(|e| Report::new(ScaleError::TransportFailure(format!("{e:#}"))))?;

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let cancel = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = xch::bounded::<()>(0);

        self.sink.reset();
        {
            let mut p = lock(&self.published);
            p.status.running = true;
            p.status.last_error = None;
            p.status.device = target.map(str::to_string);
        }

        let sink = self.sink.clone();
        let store = self.store();
        let runner = self.runner.clone();
        let clock = self.clock.clone();
        let published = self.published.clone();
        let current = self.generation.clone();
        let cancel_worker = cancel.clone();
        let target = target.map(str::to_string);

        let handle = std::thread::Builder::new()
            .name("miscale-session".into())
            .spawn(move || {
                let _done = done_tx;
                let result = catch_unwind(AssertUnwindSafe(|| {
                    let outcome = run_session(
                        transport,
                        &mut session,
                        target.as_deref(),
                        &runner,
                        &*sink,
                        &*store,
                        &cancel_worker,
                        clock,
                    );
                    (outcome, session.device().map(str::to_string))
                }));
                let (outcome, device): (SessionOutcome, Option<String>) = match result {
                    Ok((Ok(m), dev)) => (Ok(m), dev),
                    Ok((Err(report), dev)) => {
                        let err = report
                            .downcast_ref::<ScaleError>()
                            .cloned()
                            .unwrap_or_else(|| ScaleError::TransportFailure(format!("{report:#}")));
                        (Err(err), dev)
                    }
                    Err(_) => {
                        tracing::error!(generation, "session worker panicked");
                        sink.emit(StatusEvent::error("Measurement failed: internal error"));
                        (
                            Err(ScaleError::TransportFailure("session worker panicked".into())),
                            None,
                        )
                    }
                };

                if current.load(Ordering::Acquire) != generation {
                    tracing::debug!(generation, "stale session result discarded");
                    return;
                }
                let mut p = lock(&published);
                p.status.running = false;
                if device.is_some() {
                    p.status.device = device;
                }
                match &outcome {
                    Ok(m) => p.status.last_measurement = Some(m.clone()),
                    Err(e) => p.status.last_error = Some(e.clone()),
                }
                p.finished_generation = generation;
                p.last_outcome = Some(outcome);
            });

        let handle = match handle {
            Ok(h) => h,
            Err(e) => {
                lock(&self.published).status.running = false;
                return Err(Report::new(ScaleError::TransportFailure(format!(
                    "failed to spawn session worker: {e}"
                ))));
            }
        };

        tracing::info!(generation, "session started");
        *slot = Some(Active {
            generation,
            cancel,
            handle: Some(handle),
            done: done_rx,
        });
        Ok(())
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        let slot = self.active.get_mut().unwrap_or_else(PoisonError::into_inner);
        Self::stop_locked(slot);
    }
}
