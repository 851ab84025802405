use rstest::rstest;
use sorter_core::config::LineCfg;
use sorter_core::{BuildError, ProfileTable, Sorter, SorterBuilder};
use sorter_hardware::{Axis, SimLine, SimLineCfg, Site};
use sorter_traits::MonotonicClock;
use std::sync::Arc;

fn sim() -> SimLine {
    SimLine::new(SimLineCfg::default(), Arc::new(MonotonicClock::new()), [])
}

fn complete(line: &SimLine) -> SorterBuilder {
    Sorter::builder()
        .upstream_sensor(line.sensor(Site::Upstream))
        .downstream_sensor(line.sensor(Site::Downstream))
        .scanner(line.motor(Axis::Scanner))
        .feeder(line.motor(Axis::Feeder))
        .dropoff(line.motor(Axis::Dropoff))
        .arm(line.motor(Axis::Arm))
}

fn build_error(b: SorterBuilder) -> BuildError {
    let err = b.try_build().unwrap_err();
    err.downcast_ref::<BuildError>()
        .cloned()
        .unwrap_or_else(|| panic!("not a BuildError: {err}"))
}

#[test]
fn complete_builder_uses_defaults() {
    let line = sim();
    let sorter = complete(&line).try_build().unwrap();
    assert_eq!(sorter.profiles().len(), 14);
    assert_eq!(sorter.config().scan.speed, 600);
}

#[test]
fn missing_upstream_sensor() {
    let line = sim();
    let b = Sorter::builder()
        .downstream_sensor(line.sensor(Site::Downstream))
        .scanner(line.motor(Axis::Scanner));
    assert!(matches!(build_error(b), BuildError::MissingUpstreamSensor));
}

#[test]
fn missing_arm_is_named() {
    let line = sim();
    let b = Sorter::builder()
        .upstream_sensor(line.sensor(Site::Upstream))
        .downstream_sensor(line.sensor(Site::Downstream))
        .scanner(line.motor(Axis::Scanner))
        .feeder(line.motor(Axis::Feeder))
        .dropoff(line.motor(Axis::Dropoff));
    let err = build_error(b);
    assert!(matches!(err, BuildError::MissingMotor("arm")));
    assert_eq!(err.to_string(), "missing arm motor");
}

#[rstest]
#[case::zero_debounce(|c: &mut LineCfg| c.detector.debounce = 0, "debounce")]
#[case::forward_rescan(|c: &mut LineCfg| c.scan.rescan_distance = 450, "negative")]
#[case::no_samples(|c: &mut LineCfg| c.extractor.upstream_samples = 0, "upstream_samples")]
#[case::ramp_below_nominal(|c: &mut LineCfg| c.feed.max_speed = 10, "nominal")]
#[case::zero_in_row(|c: &mut LineCfg| c.rescan.max_in_row = 0, "max_in_row")]
fn invalid_config_is_rejected(#[case] tweak: fn(&mut LineCfg), #[case] needle: &str) {
    let line = sim();
    let mut cfg = LineCfg::default();
    tweak(&mut cfg);
    match build_error(complete(&line).config(cfg)) {
        BuildError::InvalidConfig(msg) => assert!(msg.contains(needle), "{msg}"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn empty_profile_table_is_rejected() {
    let line = sim();
    let b = complete(&line).profiles(ProfileTable::new(Vec::new()));
    assert!(matches!(build_error(b), BuildError::InvalidConfig(_)));
}
