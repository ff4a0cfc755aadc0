//! `miscale`: weigh in on a Mi body composition scale and keep the history.

mod cli;
mod error_fmt;
mod weigh;

use std::path::Path;

use clap::Parser;
use eyre::WrapErr;
use miscale_config::{Config, Logging};
use miscale_core::{MeasurementStore, StabilityCfg, UserProfile};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::{Cli, Commands, DEFAULT_CONFIG, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = run(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        tracing::debug!(error = ?err, "exiting with error");
        std::process::exit(exit_code_for_error(&err));
    }
}

fn run(cli: Cli) -> eyre::Result<()> {
    let mut cfg = load_config(cli.config.as_deref())?;
    init_logging(cli.json, cli.log_level.as_deref(), &cfg.logging)?;
    tracing::debug!(?cfg, "effective config");

    match cli.cmd {
        Commands::Weigh {
            address,
            age,
            height_cm,
            gender,
            sim,
        } => {
            if let Some(a) = address {
                cfg.scale.address = Some(a);
            }
            if let Some(a) = age {
                cfg.profile.age = a;
            }
            if let Some(h) = height_cm {
                cfg.profile.height_cm = h;
            }
            if let Some(g) = gender {
                cfg.profile.gender = g;
            }
            // Profile problems surface as InvalidProfile, not a config error.
            let profile = UserProfile::try_from(&cfg.profile)?;
            cfg.validate().wrap_err("invalid configuration")?;
            let m = weigh::run_weigh(&cfg, profile, sim, cli.json)?;
            weigh::print_measurement(&m, cli.json)?;
        }
        Commands::History { limit } => {
            let store = weigh::open_store(&cfg)?;
            let rows = store.query(limit)?;
            if cli.json {
                println!("{}", serde_json::to_string(&rows)?);
            } else if rows.is_empty() {
                println!("No measurements recorded.");
            } else {
                println!(
                    "{:>5}  {:<32}  {:>8}  {:>5}  {:>7}  {:>6}",
                    "id", "timestamp", "kg", "bmi", "bmr", "fat%"
                );
                for r in rows {
                    let m = &r.measurement;
                    println!(
                        "{:>5}  {:<32}  {:>8.2}  {:>5.1}  {:>7.0}  {:>6.1}",
                        r.id,
                        m.timestamp.to_rfc3339(),
                        m.weight,
                        m.bmi,
                        m.bmr,
                        m.body_fat_percentage
                    );
                }
            }
        }
        Commands::Config => {
            let stability = StabilityCfg::from(&cfg.stability);
            let view = serde_json::json!({
                "scale_mac": cfg.scale.address,
                "age": cfg.profile.age,
                "height_cm": cfg.profile.height_cm,
                "gender": cfg.profile.gender,
                "stable_readings_required": stability.required_readings,
                "weight_tolerance": stability.weight_tolerance_kg,
                "min_stable_duration_seconds": stability.min_stable_ms as f64 / 1000.0,
                "db_path": cfg.store.path,
            });
            if cli.json {
                println!("{view}");
            } else {
                println!("{}", serde_json::to_string_pretty(&view)?);
            }
        }
        Commands::Health => {
            let v = serde_json::json!({
                "status": "healthy",
                "timestamp": chrono::Utc::now().to_rfc3339(),
            });
            println!("{v}");
        }
    }
    Ok(())
}

/// Explicit `--config` must exist; the default file is optional.
fn load_config(path: Option<&Path>) -> eyre::Result<Config> {
    let mut cfg = match path {
        Some(p) => miscale_config::load_file(p)?,
        None if Path::new(DEFAULT_CONFIG).exists() => {
            miscale_config::load_file(Path::new(DEFAULT_CONFIG))?
        }
        None => Config::default(),
    };
    cfg.apply_process_env()
        .wrap_err("invalid configuration in environment")?;
    Ok(cfg)
}

fn init_logging(json: bool, level: Option<&str>, logging: &Logging) -> eyre::Result<()> {
    let level = level.or(logging.level.as_deref()).unwrap_or("warn");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level '{level}'"))?;

    let console_json = json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let console_pretty = (!json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));

    let file_layer = match &logging.file {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name"))?;
            let appender = match logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().json().with_ansi(false).with_writer(writer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_json)
        .with(console_pretty)
        .with(file_layer)
        .try_init()
        .wrap_err("installing tracing subscriber")?;
    Ok(())
}
