use std::sync::Arc;

use sorter_core::calibration::{calibrate, BackgroundModel, Calibrator};
use sorter_core::config::{CalibrateCfg, ScanCfg};
use sorter_core::line::MotorHandle;
use sorter_core::{Stage, FACTORY_DEFAULTS, OPERATING_DEFAULTS};
use sorter_hardware::{Axis, SimLine, SimLineCfg, Site};
use sorter_traits::{Clock, ManualClock, Rgb};

#[test]
fn missing_store_falls_back_to_operating_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let m = BackgroundModel::load_or_default(&dir.path().join("nope.txt"));
    assert_eq!(m.to_flat(), OPERATING_DEFAULTS);
}

#[test]
fn short_store_falls_back_to_operating_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bg.txt");
    std::fs::write(&path, "1\n2\n3\n").unwrap();
    assert_eq!(BackgroundModel::load_or_default(&path), BackgroundModel::default());
}

#[test]
fn saved_model_is_loaded_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bg.txt");
    BackgroundModel::factory().save(&path).unwrap();
    let loaded = BackgroundModel::load_or_default(&path);
    assert_eq!(loaded.to_flat(), FACTORY_DEFAULTS);
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 12);
}

#[test]
fn calibrating_an_empty_belt_records_its_background() {
    let clock = Arc::new(ManualClock::new());
    let shared: Arc<dyn Clock + Send + Sync> = clock.clone();
    let line = SimLine::new(SimLineCfg::default(), Arc::clone(&shared), []);
    let scanner = MotorHandle::new("scanner", Box::new(line.motor(Axis::Scanner)));
    let mut up = line.sensor(Site::Upstream);
    let mut down = line.sensor(Site::Downstream);
    let cfg = CalibrateCfg {
        duration_ms: 500,
        sample_ms: 10,
    };

    let model = calibrate(&scanner, &mut up, &mut down, &shared, &ScanCfg::default(), &cfg).unwrap();

    assert_eq!(model.to_flat(), [17, 28, 31, 17, 28, 31, 1, 3, 10, 1, 3, 10]);
    assert_eq!(line.speed(Axis::Scanner), 0);
    // reverse by the reject distance (~0.9 s) plus the sampling window
    assert!(clock.elapsed().as_millis() >= 1_300);
}

#[test]
fn noisy_background_widens_the_range() {
    let mut c = Calibrator::default();
    for rgb in [Rgb::new(17, 28, 31), Rgb::new(16, 29, 30), Rgb::new(18, 27, 33)] {
        c.observe(Stage::Upstream, rgb);
    }
    c.observe(Stage::Downstream, Rgb::new(1, 3, 10));
    let m = c.finish();
    assert_eq!(m.bounds(Stage::Upstream).low, [16, 27, 30]);
    assert_eq!(m.bounds(Stage::Upstream).high, [18, 29, 33]);
    assert!(!m.bounds(Stage::Upstream).is_anomalous(Rgb::new(17, 28, 31)));
}
