//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();
/// Device the current run targeted, for JSON error details.
pub static LAST_DEVICE: OnceLock<String> = OnceLock::new();

/// Config file picked up when `--config` is not given and it exists.
pub const DEFAULT_CONFIG: &str = "miscale.toml";

#[derive(Parser, Debug)]
#[command(name = "miscale", version, about = "Mi body composition scale weigh-in")]
pub struct Cli {
    /// Path to config TOML (defaults to ./miscale.toml when present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Emit JSON lines instead of human-readable text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); default from config, else warn
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one weigh-in and store the settled measurement
    Weigh {
        /// Scale MAC address; omitted means scan for the first scale found
        #[arg(long, value_name = "MAC")]
        address: Option<String>,
        /// Override profile age in years
        #[arg(long)]
        age: Option<i64>,
        /// Override profile height in centimetres
        #[arg(long = "height-cm", value_name = "CM")]
        height_cm: Option<f64>,
        /// Override profile gender (male|female)
        #[arg(long)]
        gender: Option<String>,
        /// Use the built-in simulated scale instead of Bluetooth
        #[arg(long, action = ArgAction::SetTrue)]
        sim: bool,
    },
    /// List stored measurements, newest first
    History {
        /// Show at most N rows
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },
    /// Print effective stability thresholds and user profile
    Config,
    /// Liveness probe
    Health,
}
