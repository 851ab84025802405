//! Background model: per sensor, per channel `[low, high]` range of the
//! empty belt.
//!
//! The persisted flat form is 12 integers: upstream low RGB, upstream high
//! RGB, downstream low RGB, downstream high RGB.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sorter_config::BACKGROUND_LEN;
use sorter_traits::{Clock, ColorSensor, Rgb};
use tracing::{debug, info, warn};

use crate::config::{CalibrateCfg, ScanCfg};
use crate::error::Result;
use crate::hw_error::lift;
use crate::line::MotorHandle;
use crate::types::Stage;

/// Bounds a calibration run starts from; the first sample collapses them.
const WIDEN_FROM: [i32; 6] = [100, 100, 100, 0, 0, 0];

/// Bounds used while sorting when nothing valid is stored.
pub const OPERATING_DEFAULTS: [i32; BACKGROUND_LEN] = [16, 26, 28, 19, 31, 35, 0, 2, 8, 3, 5, 14];

/// Bounds written by a factory reset.
pub const FACTORY_DEFAULTS: [i32; BACKGROUND_LEN] = [20, 27, 19, 23, 31, 23, 0, 0, 0, 1, 2, 1];

/// Inclusive per-channel range for one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelBounds {
    pub low: [i32; 3],
    pub high: [i32; 3],
}

impl ChannelBounds {
    /// True when every channel lies in `[low, high]`.
    pub fn contains(&self, rgb: Rgb) -> bool {
        rgb.0
            .iter()
            .zip(self.low.iter().zip(&self.high))
            .all(|(v, (lo, hi))| lo <= v && v <= hi)
    }

    /// True when at least one channel is outside its range.
    #[inline]
    pub fn is_anomalous(&self, rgb: Rgb) -> bool {
        !self.contains(rgb)
    }

    fn widen(&mut self, rgb: Rgb) {
        for (i, v) in rgb.0.iter().enumerate() {
            self.low[i] = self.low[i].min(*v);
            self.high[i] = self.high[i].max(*v);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundModel {
    stages: [ChannelBounds; 2],
}

impl Default for BackgroundModel {
    fn default() -> Self {
        Self::from_flat(&OPERATING_DEFAULTS)
    }
}

impl BackgroundModel {
    pub fn from_flat(v: &[i32; BACKGROUND_LEN]) -> Self {
        let bounds = |o: usize| ChannelBounds {
            low: [v[o], v[o + 1], v[o + 2]],
            high: [v[o + 3], v[o + 4], v[o + 5]],
        };
        Self {
            stages: [bounds(0), bounds(6)],
        }
    }

    pub fn factory() -> Self {
        Self::from_flat(&FACTORY_DEFAULTS)
    }

    pub fn to_flat(&self) -> [i32; BACKGROUND_LEN] {
        let mut out = [0; BACKGROUND_LEN];
        for (s, b) in self.stages.iter().enumerate() {
            out[s * 6..s * 6 + 3].copy_from_slice(&b.low);
            out[s * 6 + 3..s * 6 + 6].copy_from_slice(&b.high);
        }
        out
    }

    pub fn bounds(&self, stage: Stage) -> ChannelBounds {
        self.stages[stage.index()]
    }

    /// Load from the store, falling back to [`OPERATING_DEFAULTS`] when
    /// the file is missing, short or unparsable.
    pub fn load_or_default(path: &Path) -> Self {
        match sorter_config::load_background(path) {
            Ok(v) => {
                debug!(path = %path.display(), values = ?v, "background loaded");
                Self::from_flat(&v)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "background store unusable; using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        sorter_config::save_background(path, &self.to_flat())
    }
}

/// Accumulates the range of every sample it sees.
#[derive(Debug, Clone)]
pub struct Calibrator {
    model: BackgroundModel,
    samples: u64,
}

impl Default for Calibrator {
    fn default() -> Self {
        let start = ChannelBounds {
            low: [WIDEN_FROM[0], WIDEN_FROM[1], WIDEN_FROM[2]],
            high: [WIDEN_FROM[3], WIDEN_FROM[4], WIDEN_FROM[5]],
        };
        Self {
            model: BackgroundModel {
                stages: [start; 2],
            },
            samples: 0,
        }
    }
}

impl Calibrator {
    pub fn observe(&mut self, stage: Stage, rgb: Rgb) {
        self.model.stages[stage.index()].widen(rgb);
        self.samples += 1;
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn finish(self) -> BackgroundModel {
        self.model
    }
}

/// Run the belt empty and record the background seen by both sensors.
///
/// The belt is first reversed by the reject distance to clear it, then run
/// at scan speed while both sensors are sampled every `sample_ms` for
/// `duration_ms`; it is braked afterwards.
pub fn calibrate(
    scanner: &MotorHandle,
    upstream: &mut dyn ColorSensor,
    downstream: &mut dyn ColorSensor,
    clock: &Arc<dyn Clock + Send + Sync>,
    scan: &ScanCfg,
    cfg: &CalibrateCfg,
) -> Result<BackgroundModel> {
    info!(duration_ms = cfg.duration_ms, "calibrating background");
    scanner.run_angle(scan.reverse_speed, scan.reject_distance)?;
    scanner.run(scan.speed)?;

    let mut cal = Calibrator::default();
    let epoch = clock.now();
    let period = Duration::from_millis(cfg.sample_ms.max(1));
    while clock.ms_since(epoch) < cfg.duration_ms {
        cal.observe(Stage::Upstream, lift(upstream.rgb())?);
        cal.observe(Stage::Downstream, lift(downstream.rgb())?);
        clock.sleep(period);
    }
    scanner.brake()?;

    let model = cal.finish();
    info!(bounds = ?model.to_flat(), "calibration finished");
    Ok(model)
}
