//! Configuration types for the sorting pipeline.
//!
//! These are the runtime configuration structs used by the stages.
//! They are separate from the TOML-deserialized config in `sorter_config`.

/// Scanning belt motion.
#[derive(Debug, Clone)]
pub struct ScanCfg {
    /// Scan speed (deg/s).
    pub speed: i32,
    /// Speed used for every reversal (deg/s).
    pub reverse_speed: i32,
    /// Relative move for a rescan; negative means backwards.
    pub rescan_distance: i64,
    /// Relative move for a reject; negative means backwards.
    pub reject_distance: i64,
    /// Sleep between position polls (ms).
    pub poll_ms: u64,
}

impl Default for ScanCfg {
    fn default() -> Self {
        Self {
            speed: 600,
            reverse_speed: 900,
            rescan_distance: -450,
            reject_distance: -800,
            poll_ms: 2,
        }
    }
}

/// Feeder belt ramp.
#[derive(Debug, Clone)]
pub struct FeedCfg {
    pub nominal_speed: i32,
    pub max_speed: i32,
    pub ramp_step: i32,
    /// Time without an object before each ramp step.
    pub idle_ms: u64,
}

impl Default for FeedCfg {
    fn default() -> Self {
        Self {
            nominal_speed: 250,
            max_speed: 900,
            ramp_step: 20,
            idle_ms: 1_000,
        }
    }
}

/// Boundary detection.
#[derive(Debug, Clone)]
pub struct DetectorCfg {
    /// Consecutive anomalous samples needed for an Enter.
    pub debounce: u8,
    /// Downstream length beyond which an object is flagged over-length.
    pub max_length: i64,
}

impl Default for DetectorCfg {
    fn default() -> Self {
        Self {
            debounce: 3,
            max_length: 160,
        }
    }
}

/// Where and how features are sampled.
#[derive(Debug, Clone)]
pub struct ExtractorCfg {
    /// Offset from the upstream start before averaging begins.
    pub upstream_offset: i64,
    pub upstream_samples: usize,
    /// Offset from the upstream start (belt frame) of the downstream sample.
    pub downstream_offset: i64,
}

impl Default for ExtractorCfg {
    fn default() -> Self {
        Self {
            upstream_offset: 30,
            upstream_samples: 5,
            downstream_offset: 270,
        }
    }
}

/// Swing arm and dropoff belt timing.
#[derive(Debug, Clone)]
pub struct DispatchCfg {
    pub arm_speed: i32,
    pub dropoff_speed: i32,
    /// Dropoff belt travel from the scanner exit to the arm.
    pub dropoff_distance: i64,
    pub min_gap_ms: u64,
    /// Swing time assumed for the first object after start.
    pub first_swing_ms: u64,
    /// Arm position used while priming.
    pub park_position: i64,
}

impl Default for DispatchCfg {
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

#[derive(Debug, Clone)]
pub struct RescanCfg {
    /// Indeterminate results in a row that turn a rescan into a reject.
    pub max_in_row: u8,
}

impl Default for RescanCfg {
    fn default() -> Self {
        Self { max_in_row: 3 }
    }
}

/// Staged stop on Pause.
#[derive(Debug, Clone)]
pub struct PauseCfg {
    pub scanner_delay_ms: u64,
    /// Measured from the scanning belt stop.
    pub dropoff_delay_ms: u64,
}

impl Default for PauseCfg {
    fn default() -> Self {
        Self {
            scanner_delay_ms: 5_000,
            dropoff_delay_ms: 3_000,
        }
    }
}

/// Background calibration run.
#[derive(Debug, Clone)]
pub struct CalibrateCfg {
    pub duration_ms: u64,
    pub sample_ms: u64,
}

impl Default for CalibrateCfg {
    fn default() -> Self {
        Self {
            duration_ms: 10_000,
            sample_ms: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryCfg {
    pub retry_ms: u64,
}

impl Default for TelemetryCfg {
    fn default() -> Self {
        Self { retry_ms: 100 }
    }
}

#[derive(Debug, Clone)]
pub struct DisplayCfg {
    pub interval_ms: u64,
}

impl Default for DisplayCfg {
    fn default() -> Self {
        Self { interval_ms: 5_000 }
    }
}

/// Everything the line needs, grouped by concern.
#[derive(Debug, Clone, Default)]
pub struct LineCfg {
    pub scan: ScanCfg,
    pub feed: FeedCfg,
    pub detector: DetectorCfg,
    pub extractor: ExtractorCfg,
    pub dispatch: DispatchCfg,
    pub rescan: RescanCfg,
    pub pause: PauseCfg,
    pub calibration: CalibrateCfg,
    pub telemetry: TelemetryCfg,
    pub display: DisplayCfg,
}
