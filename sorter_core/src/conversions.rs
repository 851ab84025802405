//! `From` implementations bridging `sorter_config` types to `sorter_core` types.

use crate::config::{
    CalibrateCfg, DetectorCfg, DispatchCfg, DisplayCfg, ExtractorCfg, FeedCfg, LineCfg, PauseCfg,
    RescanCfg, ScanCfg, TelemetryCfg,
};

// ── ScanCfg ──────────────────────────────────────────────────────────────────

impl From<&sorter_config::Config> for ScanCfg {
    fn from(c: &sorter_config::Config) -> Self {
        Self {
            speed: c.scanner.speed,
            reverse_speed: c.scanner.reverse_speed,
            rescan_distance: c.scanner.rescan_distance,
            reject_distance: c.scanner.reject_distance,
            poll_ms: c.detector.poll_ms,
        }
    }
}

// ── FeedCfg ──────────────────────────────────────────────────────────────────

impl From<&sorter_config::Feeder> for FeedCfg {
    fn from(c: &sorter_config::Feeder) -> Self {
        Self {
            nominal_speed: c.nominal_speed,
            max_speed: c.max_speed,
            ramp_step: c.ramp_step,
            idle_ms: c.idle_ms,
        }
    }
}

// ── DetectorCfg / ExtractorCfg ───────────────────────────────────────────────

impl From<&sorter_config::Detector> for DetectorCfg {
    fn from(c: &sorter_config::Detector) -> Self {
        Self {
            debounce: c.debounce,
            max_length: c.max_length,
        }
    }
}

impl From<&sorter_config::Extractor> for ExtractorCfg {
    fn from(c: &sorter_config::Extractor) -> Self {
        Self {
            upstream_offset: c.upstream_offset,
            upstream_samples: c.upstream_samples,
            downstream_offset: c.downstream_offset,
        }
    }
}

// ── DispatchCfg ──────────────────────────────────────────────────────────────

impl From<&sorter_config::Dispatch> for DispatchCfg {
    fn from(c: &sorter_config::Dispatch) -> Self {
        Self {
            arm_speed: c.arm_speed,
            dropoff_speed: c.dropoff_speed,
            dropoff_distance: c.dropoff_distance,
            min_gap_ms: c.min_gap_ms,
            first_swing_ms: c.first_swing_ms,
            park_position: c.park_position,
        }
    }
}

// ── Small sections ───────────────────────────────────────────────────────────

impl From<&sorter_config::Rescan> for RescanCfg {
    fn from(c: &sorter_config::Rescan) -> Self {
        Self {
            max_in_row: c.max_in_row,
        }
    }
}

impl From<&sorter_config::Pause> for PauseCfg {
    fn from(c: &sorter_config::Pause) -> Self {
        Self {
            scanner_delay_ms: c.scanner_delay_ms,
            dropoff_delay_ms: c.dropoff_delay_ms,
        }
    }
}

impl From<&sorter_config::CalibrationCfg> for CalibrateCfg {
    fn from(c: &sorter_config::CalibrationCfg) -> Self {
        Self {
            duration_ms: c.duration_ms,
            sample_ms: c.sample_ms,
        }
    }
}

impl From<&sorter_config::Telemetry> for TelemetryCfg {
    fn from(c: &sorter_config::Telemetry) -> Self {
        Self {
            retry_ms: c.retry_ms,
        }
    }
}

impl From<&sorter_config::Display> for DisplayCfg {
    fn from(c: &sorter_config::Display) -> Self {
        Self {
            interval_ms: c.interval_ms,
        }
    }
}

// ── LineCfg ──────────────────────────────────────────────────────────────────

impl From<&sorter_config::Config> for LineCfg {
    fn from(c: &sorter_config::Config) -> Self {
        Self {
            scan: ScanCfg::from(c),
            feed: FeedCfg::from(&c.feeder),
            detector: DetectorCfg::from(&c.detector),
            extractor: ExtractorCfg::from(&c.extractor),
            dispatch: DispatchCfg::from(&c.dispatch),
            rescan: RescanCfg::from(&c.rescan),
            pause: PauseCfg::from(&c.pause),
            calibration: CalibrateCfg::from(&c.calibration),
            telemetry: TelemetryCfg::from(&c.telemetry),
            display: DisplayCfg::from(&c.display),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_maps_to_default_line() {
        let line = LineCfg::from(&sorter_config::Config::default());
        let d = LineCfg::default();
        assert_eq!(line.scan.speed, d.scan.speed);
        assert_eq!(line.scan.reject_distance, d.scan.reject_distance);
        assert_eq!(line.feed.max_speed, d.feed.max_speed);
        assert_eq!(line.detector.debounce, d.detector.debounce);
        assert_eq!(line.extractor.downstream_offset, d.extractor.downstream_offset);
        assert_eq!(line.dispatch.min_gap_ms, d.dispatch.min_gap_ms);
        assert_eq!(line.rescan.max_in_row, d.rescan.max_in_row);
        assert_eq!(line.pause.scanner_delay_ms, d.pause.scanner_delay_ms);
        assert_eq!(line.calibration.duration_ms, d.calibration.duration_ms);
        assert_eq!(line.telemetry.retry_ms, d.telemetry.retry_ms);
        assert_eq!(line.display.interval_ms, d.display.interval_ms);
    }
}
