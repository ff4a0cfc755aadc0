//! The `weigh` command: assemble transport, store and sink, run one session.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use eyre::WrapErr;
use miscale_config::Config;
use miscale_core::{
    FanoutSink, FinalizedMeasurement, MeasurementStore, QueueSink, RunnerCfg, SessionController,
    StabilityCfg, StatusEvent, StatusLevel, TracingSink, UserProfile,
};
use miscale_hardware::{SimProfile, SimulatedScale};
use miscale_store::SqliteStore;
use miscale_traits::Transport;

use crate::cli::LAST_DEVICE;

/// Drains the status queue on its own thread and prints each event.
pub struct ConsolePrinter {
    done: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ConsolePrinter {
    pub fn spawn<W>(rx: Receiver<StatusEvent>, json: bool, mut out: W) -> Self
    where
        W: Write + Send + 'static,
    {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        let handle = thread::Builder::new()
            .name("miscale-console".into())
            .spawn(move || {
                loop {
                    match rx.recv_timeout(PRINT_POLL) {
                        Ok(event) => write_event(&mut out, &event, json),
                        Err(RecvTimeoutError::Timeout) if flag.load(Ordering::Acquire) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                for event in rx.try_iter() {
                    write_event(&mut out, &event, json);
                }
            });
        let handle = match handle {
            Ok(h) => Some(h),
            Err(e) => {
                tracing::warn!(error = %e, "console printer thread not started");
                None
            }
        };
        Self { done, handle }
    }

    /// Print whatever is still queued, then stop the thread.
    pub fn finish(mut self) {
        self.done.store(true, Ordering::Release);
        if let Some(h) = self.handle.take() {
            if h.join().is_err() {
                tracing::warn!("console printer panicked");
            }
        }
    }
}

const PRINT_POLL: Duration = Duration::from_millis(20);

fn write_event<W: Write>(out: &mut W, event: &StatusEvent, json: bool) {
    let res = if json {
        match serde_json::to_string(event) {
            Ok(line) => writeln!(out, "{line}"),
            Err(e) => {
                tracing::warn!(error = %e, "status event not serializable");
                return;
            }
        }
    } else {
        let tag = match event.level {
            StatusLevel::Info => "info",
            StatusLevel::Progress => "....",
            StatusLevel::Success => " ok ",
            StatusLevel::Error => "FAIL",
        };
        writeln!(out, "[{tag}] {}", event.message)
    };
    if let Err(e) = res.and_then(|()| out.flush()) {
        tracing::debug!(error = %e, "console write failed");
    }
}

pub fn sim_profile(cfg: &miscale_config::SimulatorCfg) -> SimProfile {
    SimProfile {
        weight_kg: cfg.weight_kg,
        impedance: cfg.impedance,
        rate_hz: cfg.rate_hz,
        ramp_samples: cfg.ramp_samples,
        wobble_samples: cfg.wobble_samples,
        fail_after: cfg.fail_after,
        unresponsive: cfg.unresponsive,
        ..SimProfile::default()
    }
}

fn transport_for(cfg: &Config, sim: bool) -> eyre::Result<Box<dyn Transport + Send>> {
    if sim {
        return Ok(Box::new(SimulatedScale::new(sim_profile(&cfg.simulator))));
    }
    #[cfg(feature = "ble")]
    {
        let scan = Duration::from_millis(cfg.scale.scan_timeout_ms);
        let scale = miscale_hardware::ble::BleScale::new(scan)
            .wrap_err("initializing bluetooth transport")?;
        Ok(Box::new(scale))
    }
    #[cfg(not(feature = "ble"))]
    {
        eyre::bail!("bluetooth support not compiled in; rebuild with --features ble or pass --sim")
    }
}

pub fn open_store(cfg: &Config) -> eyre::Result<Arc<SqliteStore>> {
    let store = SqliteStore::open(&cfg.store.path)
        .wrap_err_with(|| format!("opening database at {}", cfg.store.path))?;
    Ok(Arc::new(store))
}

pub fn run_weigh(
    cfg: &Config,
    profile: UserProfile,
    sim: bool,
    json: bool,
) -> eyre::Result<FinalizedMeasurement> {
    let store = open_store(cfg)?;
    let queue = Arc::new(QueueSink::new(cfg.status.queue_capacity));
    let sink = FanoutSink::new()
        .with(queue.clone())
        .with(Arc::new(TracingSink));

    // Fail fast on transport setup instead of inside the worker.
    let first = Mutex::new(Some(transport_for(cfg, sim)?));
    let factory_cfg = cfg.clone();
    let controller = SessionController::builder()
        .with_transport(move || {
            let ready = first.lock().unwrap_or_else(PoisonError::into_inner).take();
            match ready {
                Some(t) => Ok(t),
                None => transport_for(&factory_cfg, sim),
            }
        })
        .with_store(store as Arc<dyn MeasurementStore>)
        .with_sink(Arc::new(sink))
        .with_stability(StabilityCfg::from(&cfg.stability))
        .with_runner(RunnerCfg::from(cfg))
        .build()?;
    let controller = Arc::new(controller);

    {
        let c = controller.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            tracing::warn!("interrupt received; stopping session");
            c.stop();
        }) {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }

    let target = cfg.scale.address.as_deref();
    if let Some(t) = target {
        let _ = LAST_DEVICE.set(t.to_string());
    }
    tracing::info!(
        target = target.unwrap_or("<scan>"),
        sim,
        age = profile.age,
        height_cm = profile.height_cm,
        "weigh start"
    );
    let printer = ConsolePrinter::spawn(queue.subscribe(), json, std::io::stdout());
    let started = controller.start(profile, target);
    let outcome = started.map(|()| controller.wait());
    printer.finish();
    let outcome = outcome?.ok_or_else(|| eyre::eyre!("session ended without an outcome"))?;
    if let Some(device) = controller.status().device {
        let _ = LAST_DEVICE.set(device);
    }
    Ok(outcome?)
}

pub fn print_measurement(m: &FinalizedMeasurement, json: bool) -> eyre::Result<()> {
    if json {
        println!("{}", serde_json::to_string(m)?);
        return Ok(());
    }
    println!("Weight:    {:.2} kg", m.weight);
    println!("Impedance: {}", m.impedance);
    println!("BMI:       {:.1}", m.bmi);
    println!("BMR:       {:.0} kcal", m.bmr);
    println!("Body fat:  {:.1} %", m.body_fat_percentage);
    println!("Taken at:  {}", m.timestamp.to_rfc3339());
    Ok(())
}
