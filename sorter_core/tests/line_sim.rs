//! Whole-line runs on real threads and the real clock.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sorter_core::config::LineCfg;
use sorter_core::mocks::RecordingTelemetry;
use sorter_core::Sorter;
use sorter_hardware::{Axis, SimLine, SimLineCfg, SimPart, Site};
use sorter_traits::{Clock, MonotonicClock, Rgb};

fn part(label: &str, lengths: [i64; 2], up: [i32; 3], down: [i32; 3]) -> SimPart {
    SimPart {
        label: label.into(),
        lengths,
        colors: [Rgb(up), Rgb(down)],
    }
}

/// Short dropoff run and a fast arm so a test does not wait on dispatch.
fn fast_cfg() -> LineCfg {
    let mut cfg = LineCfg::default();
    cfg.dispatch.arm_speed = 12_000;
    cfg.dispatch.dropoff_distance = 600;
    cfg.dispatch.min_gap_ms = 200;
    cfg.dispatch.first_swing_ms = 200;
    cfg.pause.scanner_delay_ms = 150;
    cfg.pause.dropoff_delay_ms = 150;
    cfg
}

fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}

fn build(line: &SimLine, clock: Arc<dyn Clock + Send + Sync>, tel: RecordingTelemetry) -> Sorter {
    Sorter::builder()
        .upstream_sensor(line.sensor(Site::Upstream))
        .downstream_sensor(line.sensor(Site::Downstream))
        .scanner(line.motor(Axis::Scanner))
        .feeder(line.motor(Axis::Feeder))
        .dropoff(line.motor(Axis::Dropoff))
        .arm(line.motor(Axis::Arm))
        .telemetry(tel)
        .config(fast_cfg())
        .clock(clock)
        .try_build()
        .unwrap()
}

#[test]
fn three_parts_are_sorted_and_reported() {
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let parts = [
        part("Black 2L", [105, 74], [2, 2, 0], [0, 0, 0]),
        part("Red 3L", [136, 129], [16, 5, 1], [10, 2, 1]),
        part("LBG 2L", [107, 92], [11, 12, 7], [7, 7, 7]),
    ];
    let line = SimLine::new(
        SimLineCfg {
            feed_pitch: 100,
            ..SimLineCfg::default()
        },
        Arc::clone(&clock),
        parts,
    );
    let tel = RecordingTelemetry::new();
    let sorter = build(&line, clock, tel.clone());
    sorter.prime().unwrap();
    assert!(line.seeks().contains(&(Axis::Arm, 1700)));

    let running = sorter.start().unwrap();
    let done = wait_for(Duration::from_secs(30), || running.snapshot().total_sorted() >= 3);
    let snap = running.snapshot();
    assert!(wait_for(Duration::from_secs(2), || tel.reports().len() >= 3));
    running.shutdown().unwrap();

    assert!(done, "only {} sorted: {snap:?}", snap.total_sorted());
    for name in ["Black 2L", "Red 3L", "LBG 2L"] {
        let n = snap.sorted.iter().find(|(p, _)| p == name).map(|(_, n)| *n);
        assert_eq!(n, Some(1), "{name}");
    }
    assert_eq!(snap.total_sorted(), 3);

    let mut reports = tel.reports();
    if snap.rejects == 0 {
        assert_eq!(reports, ["Black 2L", "Red 3L", "LBG 2L"]);
    }
    reports.sort();
    assert_eq!(reports, ["Black 2L", "LBG 2L", "Red 3L"]);

    let arm: Vec<i64> = line
        .seeks()
        .into_iter()
        .filter(|(a, _)| *a == Axis::Arm)
        .map(|(_, p)| p)
        .collect();
    assert_eq!(arm.len(), 4, "park plus one move per part: {arm:?}");
    assert_eq!(line.speed(Axis::Scanner), 0);
}

#[test]
fn pause_stops_belts_in_stages_and_resume_restarts_them() {
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let line = SimLine::new(SimLineCfg::default(), Arc::clone(&clock), []);
    let running = build(&line, clock, RecordingTelemetry::new()).start().unwrap();
    assert!(wait_for(Duration::from_secs(1), || line.speed(Axis::Scanner) == 600));

    running.pause().unwrap();
    assert!(wait_for(Duration::from_secs(1), || running.is_paused()));
    assert!(wait_for(Duration::from_millis(100), || line.speed(Axis::Feeder) == 0));
    assert!(wait_for(Duration::from_secs(2), || line.speed(Axis::Scanner) == 0));
    assert!(wait_for(Duration::from_secs(2), || line.speed(Axis::Dropoff) == 0));

    running.resume().unwrap();
    assert!(wait_for(Duration::from_secs(1), || !running.is_paused()));
    assert!(wait_for(Duration::from_secs(1), || {
        line.speed(Axis::Scanner) == 600
            && line.speed(Axis::Dropoff) == 1200
            && line.speed(Axis::Feeder) > 0
    }));
    assert!(running.is_running());
    running.shutdown().unwrap();
    assert_eq!(line.speed(Axis::Feeder), 0);
}
