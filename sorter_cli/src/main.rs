#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `sorter` binary: run, calibrate and inspect the sorting line.

mod cli;
mod error_fmt;
mod run;
mod sim;
mod sink;

use clap::Parser;
use sorter_config::{Config, Logging};
use sorter_core::error::{Result, SorterError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::cli::{Cli, Commands, FILE_GUARD};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    if let Err(e) = real_main(&cli) {
        tracing::error!(error = %e, "command failed");
        if cli.json {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: &Cli) -> Result<()> {
    let cfg = run::load_config(cli.config.as_deref())?;
    init_tracing(cli, &cfg.logging)?;
    match &cli.cmd {
        Commands::Run {
            sim_parts,
            duration_ms,
        } => {
            let summary = run::cmd_run(&cfg, cli.json, *sim_parts, *duration_ms)?;
            run::print_summary(&summary, cli.json);
        }
        Commands::Calibrate => {
            let model = run::cmd_calibrate(&cfg)?;
            print_background(&cfg, &model, "calibrated", cli.json);
        }
        Commands::FactoryReset => {
            let model = run::cmd_factory_reset(&cfg)?;
            print_background(&cfg, &model, "factory", cli.json);
        }
        Commands::ShowCalibration => {
            let (model, source) = run::background_source(&cfg);
            print_background(&cfg, &model, source, cli.json);
        }
        Commands::SelfCheck => self_check(&cfg, cli.json)?,
    }
    Ok(())
}

fn print_background(
    cfg: &Config,
    model: &sorter_core::BackgroundModel,
    source: &str,
    json: bool,
) {
    let path = cfg.calibration.file.display();
    if json {
        println!(
            "{}",
            serde_json::json!({
                "event": "calibration",
                "source": source,
                "file": path.to_string(),
                "values": model.to_flat(),
            })
        );
        return;
    }
    let v = model.to_flat();
    println!("background ({source}, {path})");
    println!("upstream   low {:?} high {:?}", &v[0..3], &v[3..6]);
    println!("downstream low {:?} high {:?}", &v[6..9], &v[9..12]);
}

fn self_check(cfg: &Config, json: bool) -> Result<()> {
    let profiles = run::profile_table(cfg)?;
    let (model, source) = run::background_source(cfg);
    let backend = if cfg!(feature = "hardware") { "hardware" } else { "sim" };
    if json {
        println!(
            "{}",
            serde_json::json!({
                "event": "self_check",
                "ok": true,
                "backend": backend,
                "profiles": profiles.len(),
                "background_source": source,
                "background": model.to_flat(),
            })
        );
    } else {
        println!("backend: {backend}");
        println!("profiles: {}", profiles.len());
        println!("background: {source} {:?}", model.to_flat());
        println!("self-check ok");
    }
    Ok(())
}

/// Console logs go to stderr (stdout carries telemetry); an optional JSON
/// file sink follows `[logging]`.
fn init_tracing(cli: &Cli, logging: &Logging) -> Result<()> {
    let level = cli
        .log_level
        .clone()
        .or_else(|| logging.level.clone())
        .unwrap_or_else(|| "info".to_owned());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .map_err(|e| eyre::Report::new(SorterError::Config(format!("log level {level:?}: {e}"))))?;

    let json_console = cli.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_console = (!cli.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    let file_layer = match &logging.file {
        None => None,
        Some(file) => {
            let path = std::path::Path::new(file);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path.file_name().unwrap_or(path.as_os_str());
            let appender = match logging.rotation.as_deref() {
                None | Some("never") => tracing_appender::rolling::never(dir, name),
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                Some(other) => {
                    return Err(eyre::Report::new(SorterError::Config(format!(
                        "logging.rotation must be never, daily or hourly (got {other:?})"
                    ))));
                }
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer),
            )
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_console)
        .with(text_console)
        .with(file_layer)
        .try_init()
        .map_err(|e| eyre::Report::new(SorterError::State(format!("install logger: {e}"))))?;
    Ok(())
}
