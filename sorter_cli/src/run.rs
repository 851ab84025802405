//! Command bodies: config loading, backend assembly and the sort loop.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use eyre::WrapErr;
use sorter_config::Config;
use sorter_core::calibration::{self, BackgroundModel};
use sorter_core::error::{Result, SorterError};
use sorter_core::line::MotorHandle;
use sorter_core::{Command, LineCfg, ProfileTable, Sorter};
use sorter_hardware::SimPart;
use sorter_traits::{Clock, ColorSensor, Motor};
use sorter_ui::Summary;

use crate::cli::DEFAULT_CONFIG;
use crate::sim;
use crate::sink::StdoutTelemetry;

const LOOP_WAIT: Duration = Duration::from_millis(50);

fn config_err(msg: String) -> eyre::Report {
    eyre::Report::new(SorterError::Config(msg))
}

/// Load and validate the config. Without an explicit path a missing
/// default file means built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    };
    if !explicit && !path.exists() {
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(&path)
        .map_err(|e| config_err(format!("read {}: {e}", path.display())))?;
    let cfg = sorter_config::load_toml(&text)
        .map_err(|e| config_err(format!("parse {}: {}", path.display(), e.message())))?;
    cfg.validate().map_err(|e| config_err(e.to_string()))?;
    Ok(cfg)
}

/// Profiles from `[[profiles]]`, or the built-in table when none are given.
pub fn profile_table(cfg: &Config) -> Result<ProfileTable> {
    if cfg.profiles.is_empty() {
        return Ok(ProfileTable::builtin());
    }
    ProfileTable::try_from(cfg.profiles.as_slice()).map_err(eyre::Report::new)
}

/// Everything the line is assembled from.
pub struct Backend {
    pub upstream: Box<dyn ColorSensor + Send>,
    pub downstream: Box<dyn ColorSensor + Send>,
    pub scanner: Box<dyn Motor + Send>,
    pub feeder: Box<dyn Motor + Send>,
    pub dropoff: Box<dyn Motor + Send>,
    pub arm: Box<dyn Motor + Send>,
    pub clock: Arc<dyn Clock + Send + Sync>,
    pub name: &'static str,
}

#[cfg(not(feature = "hardware"))]
fn open_backend(_cfg: &Config, parts: Vec<SimPart>) -> Result<Backend> {
    use sorter_hardware::{Axis, SimLine, SimLineCfg, Site};
    use sorter_traits::MonotonicClock;

    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let line = SimLine::new(SimLineCfg::default(), Arc::clone(&clock), parts);
    let upstream: Box<dyn ColorSensor + Send> = match sim::FailingSensor::from_env() {
        Some(failing) => {
            tracing::warn!(var = sim::FAULT_ENV, "simulated upstream sensor fault enabled");
            Box::new(failing)
        }
        None => Box::new(line.sensor(Site::Upstream)),
    };
    Ok(Backend {
        upstream,
        downstream: Box::new(line.sensor(Site::Downstream)),
        scanner: Box::new(line.motor(Axis::Scanner)),
        feeder: Box::new(line.motor(Axis::Feeder)),
        dropoff: Box::new(line.motor(Axis::Dropoff)),
        arm: Box::new(line.motor(Axis::Arm)),
        clock,
        name: "sim",
    })
}

#[cfg(feature = "hardware")]
fn open_backend(cfg: &Config, _parts: Vec<SimPart>) -> Result<Backend> {
    use sorter_core::hw_error::map_hw_error;
    use sorter_hardware::{Stepper, Tcs34725};
    use sorter_traits::MonotonicClock;

    let hw = &cfg.hardware;
    let timeout = Duration::from_millis(hw.sensor_read_timeout_ms);
    let sensor = |bus: u8| -> Result<Box<dyn ColorSensor + Send>> {
        let s = Tcs34725::new(bus, timeout)
            .map_err(|e| eyre::Report::new(map_hw_error(&e)))
            .wrap_err_with(|| format!("open color sensor on i2c bus {bus}"))?;
        Ok(Box::new(s))
    };
    let motor = |name: &str, p: &sorter_config::MotorPins| -> Result<Box<dyn Motor + Send>> {
        let m = Stepper::new(p.step, p.dir, p.steps_per_degree)
            .map_err(|e| eyre::Report::new(map_hw_error(&e)))
            .wrap_err_with(|| format!("open {name} motor pins {}/{}", p.step, p.dir))?;
        Ok(Box::new(m))
    };
    Ok(Backend {
        upstream: sensor(hw.upstream_i2c_bus)?,
        downstream: sensor(hw.downstream_i2c_bus)?,
        scanner: motor("scanner", &hw.scanner)?,
        feeder: motor("feeder", &hw.feeder)?,
        dropoff: motor("dropoff", &hw.dropoff)?,
        arm: motor("arm", &hw.arm)?,
        clock: Arc::new(MonotonicClock::new()),
        name: "hardware",
    })
}

/// Whether the chosen backend has a finite hopper we can wait out.
fn finite_hopper() -> bool {
    !cfg!(feature = "hardware")
}

pub fn parse_command(line: &str) -> Option<Command> {
    match line.trim().to_ascii_lowercase().as_str() {
        "pause" | "p" => Some(Command::Pause),
        "resume" | "r" => Some(Command::Resume),
        _ => None,
    }
}

/// Read `pause`/`resume` lines from stdin until EOF. The thread is left
/// detached: a blocked stdin read cannot be interrupted.
fn spawn_stdin_commands(tx: crossbeam_channel::Sender<Command>) {
    let spawned = std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match parse_command(&line) {
                    Some(cmd) => {
                        if tx.send(cmd).is_err() {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => tracing::warn!(input = %line.trim(), "unknown command; expected pause or resume"),
                }
            }
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "stdin commands unavailable");
    }
}

pub fn print_summary(summary: &Summary, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::json!({ "event": "summary", "summary": summary })
        );
    } else {
        println!("{summary}");
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Prime, start and supervise the line until the sim hopper is sorted,
/// the duration elapses, Ctrl-C, or a worker fails.
pub fn cmd_run(cfg: &Config, json: bool, sim_parts: usize, duration_ms: Option<u64>) -> Result<Summary> {
    let line_cfg = LineCfg::from(cfg);
    let profiles = profile_table(cfg)?;
    let background = BackgroundModel::load_or_default(&cfg.calibration.file);
    let parts = sim::hopper(&profiles, &background, sim_parts);
    let hw = open_backend(cfg, parts)?;
    tracing::info!(backend = hw.name, sim_parts, ?duration_ms, "starting run");

    let started = Instant::now();
    let sorter = Sorter::builder()
        .upstream_sensor(hw.upstream)
        .downstream_sensor(hw.downstream)
        .scanner(hw.scanner)
        .feeder(hw.feeder)
        .dropoff(hw.dropoff)
        .arm(hw.arm)
        .clock(hw.clock)
        .telemetry(StdoutTelemetry::new(json))
        .config(line_cfg)
        .background(background)
        .profiles(profiles)
        .on_summary(move |snap| print_summary(&Summary::new(snap, elapsed_ms(started)), json))
        .try_build()?;
    let counters = Arc::clone(sorter.counters());
    let table = Arc::clone(sorter.profiles());

    sorter.prime().wrap_err("prime line")?;
    let running = sorter.start()?;
    spawn_stdin_commands(running.commands());

    let stop = Arc::new(AtomicBool::new(false));
    let s = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || s.store(true, Ordering::Relaxed)) {
        tracing::warn!(error = %e, "Ctrl-C handler not installed");
    }

    let target = finite_hopper().then_some(sim_parts as u64);
    loop {
        if stop.load(Ordering::Relaxed) {
            tracing::info!("interrupted");
            break;
        }
        if !running.is_running() {
            break;
        }
        if duration_ms.is_some_and(|d| running.uptime_ms() >= d) {
            tracing::info!("run duration reached");
            break;
        }
        if target.is_some_and(|n| counters.snapshot(&table).total_sorted() >= n) {
            tracing::info!("hopper sorted");
            break;
        }
        std::thread::sleep(LOOP_WAIT);
    }
    let uptime = running.uptime_ms();
    running.shutdown()?;
    Ok(Summary::new(&counters.snapshot(&table), uptime))
}

pub fn cmd_calibrate(cfg: &Config) -> Result<BackgroundModel> {
    let line = LineCfg::from(cfg);
    let mut hw = open_backend(cfg, Vec::new())?;
    let scanner = MotorHandle::new("scanner", hw.scanner);
    let model = calibration::calibrate(
        &scanner,
        hw.upstream.as_mut(),
        hw.downstream.as_mut(),
        &hw.clock,
        &line.scan,
        &line.calibration,
    )?;
    let path = &cfg.calibration.file;
    model
        .save(path)
        .wrap_err_with(|| format!("write background store {}", path.display()))?;
    tracing::info!(path = %path.display(), "background saved");
    Ok(model)
}

pub fn cmd_factory_reset(cfg: &Config) -> Result<BackgroundModel> {
    let model = BackgroundModel::factory();
    let path = &cfg.calibration.file;
    model
        .save(path)
        .wrap_err_with(|| format!("write background store {}", path.display()))?;
    tracing::info!(path = %path.display(), "factory background written");
    Ok(model)
}

/// Where the active background came from.
pub fn background_source(cfg: &Config) -> (BackgroundModel, &'static str) {
    match sorter_config::load_background(&cfg.calibration.file) {
        Ok(v) => (BackgroundModel::from_flat(&v), "file"),
        Err(_) => (BackgroundModel::default(), "defaults"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("pause", Some(Command::Pause))]
    #[case("  Resume \n", Some(Command::Resume))]
    #[case("p", Some(Command::Pause))]
    #[case("stop", None)]
    #[case("", None)]
    fn stdin_commands(#[case] line: &str, #[case] want: Option<Command>) {
        assert_eq!(parse_command(line), want);
    }

    #[test]
    fn missing_default_config_means_defaults() {
        // the test runs from the crate dir, which has no etc/ of its own
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg.scanner.speed, 600);
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("none.toml"))).unwrap_err();
        assert!(matches!(err.downcast_ref::<SorterError>(), Some(SorterError::Config(_))));
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[scanner]\nspeed = 0\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("scanner.speed"));
    }
}
