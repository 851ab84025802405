//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Used when `--config` is not given; missing means built-in defaults.
pub const DEFAULT_CONFIG: &str = "etc/sorter_config.toml";

#[derive(Parser, Debug)]
#[command(name = "sorter", version, about = "Two-sensor part sorter")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Emit JSON lines (telemetry, summaries, errors) instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); default from
    /// [logging].level, then info. RUST_LOG takes precedence.
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Prime the line and sort until stopped
    Run {
        /// Parts loaded into the simulated hopper (simulation backend only)
        #[arg(long, value_name = "N", default_value_t = 12)]
        sim_parts: usize,
        /// Stop after this many milliseconds
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u64>,
    },
    /// Record the empty-belt background and save it
    Calibrate,
    /// Write the factory background bounds to the store
    FactoryReset,
    /// Print the background bounds in use
    ShowCalibration,
    /// Load config and calibration and print a summary
    SelfCheck,
}
