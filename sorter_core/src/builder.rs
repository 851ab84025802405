//! Builder for `Sorter`.
//!
//! Sensors, the four motors and the configuration are collected here and
//! validated once in `try_build()`; anything optional falls back to its
//! default (operating background, built-in profiles, monotonic clock, no
//! telemetry listener).

use std::sync::Arc;

use sorter_traits::{Clock, ColorSensor, Motor, MonotonicClock, TelemetrySink};

use crate::calibration::BackgroundModel;
use crate::config::LineCfg;
use crate::error::{BuildError, Result};
use crate::line::MotorHandle;
use crate::mocks::NullTelemetry;
use crate::profile::{CountsSnapshot, ProfileCounters, ProfileTable};
use crate::runner::Sorter;

type SummaryFn = Box<dyn Fn(&CountsSnapshot) + Send>;

#[derive(Default)]
pub struct SorterBuilder {
    upstream: Option<Box<dyn ColorSensor + Send>>,
    downstream: Option<Box<dyn ColorSensor + Send>>,
    scanner: Option<Box<dyn Motor + Send>>,
    feeder: Option<Box<dyn Motor + Send>>,
    dropoff: Option<Box<dyn Motor + Send>>,
    arm: Option<Box<dyn Motor + Send>>,
    telemetry: Option<Box<dyn TelemetrySink + Send>>,
    cfg: Option<LineCfg>,
    background: Option<BackgroundModel>,
    profiles: Option<ProfileTable>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    on_summary: Option<SummaryFn>,
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

/// Reject configurations the pipeline cannot run with.
fn validate(cfg: &LineCfg, profiles: &ProfileTable) -> Result<()> {
    if cfg.scan.speed <= 0 || cfg.scan.reverse_speed <= 0 {
        return Err(invalid("scanner speeds must be > 0"));
    }
    if cfg.scan.rescan_distance >= 0 || cfg.scan.reject_distance >= 0 {
        return Err(invalid("rescan and reject distances must be negative"));
    }
    if cfg.feed.nominal_speed <= 0 || cfg.feed.max_speed < cfg.feed.nominal_speed {
        return Err(invalid("feeder speeds must satisfy 0 < nominal <= max"));
    }
    if cfg.detector.debounce == 0 {
        return Err(invalid("debounce must be >= 1"));
    }
    if cfg.detector.max_length <= 0 {
        return Err(invalid("max_length must be > 0"));
    }
    if cfg.extractor.upstream_samples == 0 {
        return Err(invalid("upstream_samples must be >= 1"));
    }
    if cfg.dispatch.arm_speed <= 0 || cfg.dispatch.dropoff_speed <= 0 {
        return Err(invalid("arm and dropoff speeds must be > 0"));
    }
    if cfg.rescan.max_in_row == 0 {
        return Err(invalid("max_in_row must be >= 1"));
    }
    if cfg.display.interval_ms == 0 {
        return Err(invalid("display interval must be >= 1 ms"));
    }
    if profiles.is_empty() {
        return Err(invalid("profile table is empty"));
    }
    Ok(())
}

impl SorterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn upstream_sensor(mut self, s: impl ColorSensor + Send + 'static) -> Self {
        self.upstream = Some(Box::new(s));
        self
    }

    #[must_use]
    pub fn downstream_sensor(mut self, s: impl ColorSensor + Send + 'static) -> Self {
        self.downstream = Some(Box::new(s));
        self
    }

    #[must_use]
    pub fn scanner(mut self, m: impl Motor + Send + 'static) -> Self {
        self.scanner = Some(Box::new(m));
        self
    }

    #[must_use]
    pub fn feeder(mut self, m: impl Motor + Send + 'static) -> Self {
        self.feeder = Some(Box::new(m));
        self
    }

    #[must_use]
    pub fn dropoff(mut self, m: impl Motor + Send + 'static) -> Self {
        self.dropoff = Some(Box::new(m));
        self
    }

    #[must_use]
    pub fn arm(mut self, m: impl Motor + Send + 'static) -> Self {
        self.arm = Some(Box::new(m));
        self
    }

    #[must_use]
    pub fn telemetry(mut self, t: impl TelemetrySink + Send + 'static) -> Self {
        self.telemetry = Some(Box::new(t));
        self
    }

    #[must_use]
    pub fn config(mut self, cfg: LineCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }

    #[must_use]
    pub fn background(mut self, model: BackgroundModel) -> Self {
        self.background = Some(model);
        self
    }

    #[must_use]
    pub fn profiles(mut self, table: ProfileTable) -> Self {
        self.profiles = Some(table);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Called every `display.interval_ms` with the current counts.
    #[must_use]
    pub fn on_summary(mut self, f: impl Fn(&CountsSnapshot) + Send + 'static) -> Self {
        self.on_summary = Some(Box::new(f));
        self
    }

    pub fn try_build(self) -> Result<Sorter> {
        let upstream = self
            .upstream
            .ok_or_else(|| eyre::Report::new(BuildError::MissingUpstreamSensor))?;
        let downstream = self
            .downstream
            .ok_or_else(|| eyre::Report::new(BuildError::MissingDownstreamSensor))?;
        let motor = |m: Option<Box<dyn Motor + Send>>, name: &'static str| {
            m.map(|m| MotorHandle::new(name, m))
                .ok_or_else(|| eyre::Report::new(BuildError::MissingMotor(name)))
        };
        let scanner = motor(self.scanner, "scanner")?;
        let feeder = motor(self.feeder, "feeder")?;
        let dropoff = motor(self.dropoff, "dropoff")?;
        let arm = motor(self.arm, "arm")?;

        let cfg = self.cfg.unwrap_or_default();
        let profiles = self.profiles.unwrap_or_else(ProfileTable::builtin);
        validate(&cfg, &profiles)?;

        let counters = Arc::new(ProfileCounters::new(profiles.len()));
        Ok(Sorter {
            cfg,
            background: self.background.unwrap_or_default(),
            profiles: Arc::new(profiles),
            counters,
            upstream,
            downstream,
            scanner,
            feeder,
            dropoff,
            arm,
            telemetry: self
                .telemetry
                .unwrap_or_else(|| Box::new(NullTelemetry)),
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(MonotonicClock::new())),
            on_summary: self.on_summary,
        })
    }
}
