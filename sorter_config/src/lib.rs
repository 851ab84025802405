#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and background-calibration persistence for the sorter.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//!   Every section has defaults, so an empty file is a valid config.
//! - The background store keeps the 12 calibration bounds one integer per
//!   line and is rewritten atomically.
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub mod atomic;

/// Number of integers in a persisted background model:
/// upstream low RGB, upstream high RGB, downstream low RGB, downstream high RGB.
pub const BACKGROUND_LEN: usize = 12;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Scanner {
    /// Forward scanning speed of the sensor belt (deg/s)
    pub speed: i32,
    /// Speed used for every reversal (deg/s)
    pub reverse_speed: i32,
    /// Relative move that returns an unresolved part in front of the first sensor
    pub rescan_distance: i64,
    /// Relative move that throws everything on the belt back into the hopper
    pub reject_distance: i64,
}

impl Default for Scanner {
    fn default() -> Self {
        Self {
            speed: 600,
            reverse_speed: 900,
            rescan_distance: -450,
            reject_distance: -800,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Feeder {
    pub nominal_speed: i32,
    pub max_speed: i32,
    /// Speed added each time the belt stays empty for `idle_ms`
    pub ramp_step: i32,
    pub idle_ms: u64,
}

impl Default for Feeder {
    fn default() -> Self {
        Self {
            nominal_speed: 250,
            max_speed: 900,
            ramp_step: 20,
            idle_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Detector {
    /// Consecutive out-of-background samples needed to declare a part
    pub debounce: u8,
    /// Longest part (encoder degrees) before it is flagged over-length
    pub max_length: i64,
    /// Sleep between polls while waiting for a belt position (ms)
    pub poll_ms: u64,
}

impl Default for Detector {
    fn default() -> Self {
        Self {
            debounce: 3,
            max_length: 160,
            poll_ms: 2,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Extractor {
    /// Distance past the upstream start before sampling begins
    pub upstream_offset: i64,
    /// Number of upstream samples averaged
    pub upstream_samples: usize,
    /// Distance past the upstream start at which the downstream sample is taken
    pub downstream_offset: i64,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            upstream_offset: 30,
            upstream_samples: 5,
            downstream_offset: 270,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Dispatch {
    /// Swing-arm speed (deg/s)
    pub arm_speed: i32,
    /// Dropoff belt speed on the arm (deg/s)
    pub dropoff_speed: i32,
    /// Belt travel from scanner hand-off to the arm tip (deg)
    pub dropoff_distance: i64,
    /// Minimum time between two parts that need different bins (ms)
    pub min_gap_ms: u64,
    /// Swing time assumed for the first part after start (ms)
    pub first_swing_ms: u64,
    /// Arm position after priming
    pub park_position: i64,
}

impl Default for Dispatch {
    fn default() -> Self {
        Self {
            arm_speed: 1200,
            dropoff_speed: 1200,
            dropoff_distance: 1500,
            min_gap_ms: 1500,
            first_swing_ms: 2000,
            park_position: 1700,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Rescan {
    /// Indeterminate results in a row that turn a rescan into a reject
    pub max_in_row: u8,
}

impl Default for Rescan {
    fn default() -> Self {
        Self { max_in_row: 3 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Pause {
    /// Delay between the feeder stop and the scanning belt stop (ms)
    pub scanner_delay_ms: u64,
    /// Further delay before the dropoff belt stops (ms)
    pub dropoff_delay_ms: u64,
}

impl Default for Pause {
    fn default() -> Self {
        Self {
            scanner_delay_ms: 5000,
            dropoff_delay_ms: 3000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Background store path (12 integers, one per line)
    pub file: PathBuf,
    /// How long the calibration run samples the empty belt (ms)
    pub duration_ms: u64,
    /// Sampling interval during calibration (ms)
    pub sample_ms: u64,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            file: PathBuf::from("calibrationdata.txt"),
            duration_ms: 10_000,
            sample_ms: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Display {
    pub interval_ms: u64,
}

impl Default for Display {
    fn default() -> Self {
        Self { interval_ms: 5000 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Telemetry {
    /// Delay before a rejected report is offered again (ms)
    pub retry_ms: u64,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self { retry_ms: 100 }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct MotorPins {
    pub step: u8,
    pub dir: u8,
    /// Microsteps per encoder degree
    #[serde(default = "default_steps_per_degree")]
    pub steps_per_degree: f32,
}

fn default_steps_per_degree() -> f32 {
    1.0
}

/// Wiring for the `hardware` backend; ignored by the simulation.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hardware {
    pub upstream_i2c_bus: u8,
    pub downstream_i2c_bus: u8,
    pub sensor_read_timeout_ms: u64,
    pub arm: MotorPins,
    pub dropoff: MotorPins,
    pub scanner: MotorPins,
    pub feeder: MotorPins,
}

impl Default for Hardware {
    fn default() -> Self {
        let pins = |step, dir| MotorPins {
            step,
            dir,
            steps_per_degree: default_steps_per_degree(),
        };
        Self {
            upstream_i2c_bus: 1,
            downstream_i2c_bus: 3,
            sensor_read_timeout_ms: 150,
            arm: pins(5, 6),
            dropoff: pins(13, 19),
            scanner: pins(20, 21),
            feeder: pins(23, 24),
        }
    }
}

/// One `[[profiles]]` entry.
///
/// `length` holds the exclusive `(low, high)` bounds for the upstream and
/// downstream stage; `upstream`/`downstream` hold inclusive `(low, high)`
/// bounds for red, green and blue.
#[derive(Debug, Deserialize, Clone)]
pub struct ProfileEntry {
    pub name: String,
    pub position: i64,
    pub length: [[i64; 2]; 2],
    pub upstream: [[f32; 2]; 3],
    pub downstream: [[f32; 2]; 3],
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub scanner: Scanner,
    pub feeder: Feeder,
    pub detector: Detector,
    pub extractor: Extractor,
    pub dispatch: Dispatch,
    pub rescan: Rescan,
    pub pause: Pause,
    pub calibration: CalibrationCfg,
    pub display: Display,
    pub telemetry: Telemetry,
    pub logging: Logging,
    pub hardware: Hardware,
    /// Replaces the built-in profile table when non-empty. Order matters:
    /// the first matching entry wins.
    pub profiles: Vec<ProfileEntry>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Scanner
        if self.scanner.speed <= 0 {
            eyre::bail!("scanner.speed must be > 0");
        }
        if self.scanner.reverse_speed <= 0 {
            eyre::bail!("scanner.reverse_speed must be > 0");
        }
        if self.scanner.rescan_distance >= 0 {
            eyre::bail!("scanner.rescan_distance must be negative (a reversal)");
        }
        if self.scanner.reject_distance >= 0 {
            eyre::bail!("scanner.reject_distance must be negative (a reversal)");
        }
        if self.scanner.reject_distance > self.scanner.rescan_distance {
            eyre::bail!("scanner.reject_distance must reverse at least as far as rescan_distance");
        }

        // Feeder
        if self.feeder.nominal_speed <= 0 {
            eyre::bail!("feeder.nominal_speed must be > 0");
        }
        if self.feeder.max_speed < self.feeder.nominal_speed {
            eyre::bail!("feeder.max_speed must be >= feeder.nominal_speed");
        }
        if self.feeder.ramp_step < 0 {
            eyre::bail!("feeder.ramp_step must be >= 0");
        }
        if self.feeder.idle_ms == 0 {
            eyre::bail!("feeder.idle_ms must be >= 1");
        }

        // Detector
        if self.detector.debounce == 0 {
            eyre::bail!("detector.debounce must be >= 1");
        }
        if self.detector.max_length <= 0 {
            eyre::bail!("detector.max_length must be > 0");
        }
        if self.detector.poll_ms > 1000 {
            eyre::bail!("detector.poll_ms is unreasonably large (>1s)");
        }

        // Extractor
        if self.extractor.upstream_samples == 0 {
            eyre::bail!("extractor.upstream_samples must be >= 1");
        }
        if self.extractor.upstream_offset < 0 || self.extractor.downstream_offset < 0 {
            eyre::bail!("extractor offsets must be >= 0");
        }

        // Dispatch
        if self.dispatch.arm_speed <= 0 {
            eyre::bail!("dispatch.arm_speed must be > 0");
        }
        if self.dispatch.dropoff_speed <= 0 {
            eyre::bail!("dispatch.dropoff_speed must be > 0");
        }
        if self.dispatch.dropoff_distance < 0 {
            eyre::bail!("dispatch.dropoff_distance must be >= 0");
        }

        // Rescan
        if self.rescan.max_in_row == 0 {
            eyre::bail!("rescan.max_in_row must be >= 1");
        }

        // Calibration
        if self.calibration.duration_ms == 0 {
            eyre::bail!("calibration.duration_ms must be >= 1");
        }
        if self.calibration.sample_ms == 0 {
            eyre::bail!("calibration.sample_ms must be >= 1");
        }

        // Display / telemetry
        if self.display.interval_ms == 0 {
            eyre::bail!("display.interval_ms must be >= 1");
        }
        if self.telemetry.retry_ms == 0 {
            eyre::bail!("telemetry.retry_ms must be >= 1");
        }

        // Profiles
        for (i, p) in self.profiles.iter().enumerate() {
            if p.name.trim().is_empty() {
                eyre::bail!("profiles[{i}].name must not be empty");
            }
            for [lo, hi] in p.length {
                if lo >= hi {
                    eyre::bail!("profiles[{i}] ({}) has an empty length range", p.name);
                }
            }
            for [lo, hi] in p.upstream.iter().chain(p.downstream.iter()) {
                if !(lo.is_finite() && hi.is_finite()) || lo > hi {
                    eyre::bail!("profiles[{i}] ({}) has an invalid channel range", p.name);
                }
            }
        }
        let mut names: Vec<&str> = self.profiles.iter().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        if let Some(w) = names.windows(2).find(|w| w[0] == w[1]) {
            eyre::bail!("profiles contain duplicate name {:?}", w[0]);
        }

        Ok(())
    }
}

/// Parse the background store text: one integer per line, blank lines ignored.
///
/// Fails when fewer than [`BACKGROUND_LEN`] values are present or a line is
/// not an integer. Extra trailing values are ignored.
pub fn parse_background(text: &str) -> eyre::Result<[i32; BACKGROUND_LEN]> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut values = Vec::with_capacity(BACKGROUND_LEN);
    for (idx, rec) in rdr.records().enumerate() {
        let rec = rec.map_err(|e| eyre::eyre!("read background line {}: {}", idx + 1, e))?;
        let Some(field) = rec.get(0) else { continue };
        if field.is_empty() {
            continue;
        }
        let v: i32 = field
            .parse()
            .map_err(|e| eyre::eyre!("background line {} ({field:?}): {e}", idx + 1))?;
        values.push(v);
        if values.len() == BACKGROUND_LEN {
            break;
        }
    }

    values.try_into().map_err(|v: Vec<i32>| {
        eyre::eyre!(
            "background store holds {} values, expected {BACKGROUND_LEN}",
            v.len()
        )
    })
}

/// Render the background store text for `values`.
pub fn render_background(values: &[i32; BACKGROUND_LEN]) -> eyre::Result<Vec<u8>> {
    let mut w = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    for v in values {
        w.write_record([v.to_string()])?;
    }
    w.into_inner()
        .map_err(|e| eyre::eyre!("flush background store: {}", e.error()))
}

/// Read the background store at `path`.
pub fn load_background(path: &Path) -> eyre::Result<[i32; BACKGROUND_LEN]> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("open background store {:?}: {}", path, e))?;
    parse_background(&text)
}

/// Atomically replace the background store at `path`.
pub fn save_background(path: &Path, values: &[i32; BACKGROUND_LEN]) -> eyre::Result<()> {
    let bytes = render_background(values)?;
    atomic::write_atomic(path, &bytes)
        .map_err(|e| eyre::eyre!("write background store {:?}: {}", path, e))?;
    tracing::debug!(path = %path.display(), "background store written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_all_defaults() {
        let cfg = load_toml("").expect("parse");
        assert_eq!(cfg.scanner.speed, 600);
        assert_eq!(cfg.feeder.max_speed, 900);
        assert_eq!(cfg.detector.debounce, 3);
        assert_eq!(cfg.extractor.downstream_offset, 270);
        assert_eq!(cfg.dispatch.min_gap_ms, 1500);
        assert!(cfg.profiles.is_empty());
        cfg.validate().expect("defaults are valid");
    }

    #[test]
    fn parse_skips_blank_lines_and_trims() {
        let text = " 16\n26\n\n28\n19\n31\n35\n0\n2\n8\n3\n5\n14\n";
        let v = parse_background(text).expect("parse");
        assert_eq!(v, [16, 26, 28, 19, 31, 35, 0, 2, 8, 3, 5, 14]);
    }

    #[test]
    fn parse_rejects_short_store() {
        let err = parse_background("1\n2\n3\n").expect_err("short");
        assert!(format!("{err}").contains("expected 12"));
    }

    #[test]
    fn parse_rejects_non_integer() {
        let mut text = "1\n".repeat(11);
        text.push_str("abc\n");
        let err = parse_background(&text).expect_err("garbage");
        assert!(format!("{err}").contains("line 12"));
    }
}
