use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;
use sorter_hardware::{Axis, SimLine, SimLineCfg, SimPart, Site};
use sorter_traits::{ColorSensor, ManualClock, Motor, Rgb};

fn part(label: &str, up_len: i64, down_len: i64) -> SimPart {
    SimPart {
        label: label.into(),
        lengths: [up_len, down_len],
        colors: [Rgb::new(4, 3, 1), Rgb::new(2, 1, 0)],
    }
}

fn line(parts: Vec<SimPart>) -> (ManualClock, SimLine) {
    let clock = ManualClock::new();
    let line = SimLine::new(SimLineCfg::default(), Arc::new(clock.clone()), parts);
    (clock, line)
}

#[test]
fn empty_belt_reads_background_at_both_sensors() {
    let (_clock, line) = line(vec![]);
    let cfg = SimLineCfg::default();
    assert_eq!(line.sensor(Site::Upstream).rgb().unwrap(), cfg.backgrounds[0]);
    assert_eq!(line.sensor(Site::Downstream).rgb().unwrap(), cfg.backgrounds[1]);
}

#[test]
fn sensor_read_takes_one_sample_period() {
    let (clock, line) = line(vec![]);
    let mut up = line.sensor(Site::Upstream);
    up.rgb().unwrap();
    up.rgb().unwrap();
    assert_eq!(clock.elapsed(), Duration::from_millis(4));
}

#[rstest]
#[case(Site::Upstream, 99, false)]
#[case(Site::Upstream, 100, true)]
#[case(Site::Upstream, 179, true)]
#[case(Site::Upstream, 180, false)]
#[case(Site::Downstream, 336, false)]
#[case(Site::Downstream, 337, true)]
#[case(Site::Downstream, 396, true)]
#[case(Site::Downstream, 397, false)]
fn part_visible_only_over_its_length(#[case] site: Site, #[case] at: i64, #[case] seen: bool) {
    let (_clock, line) = line(vec![]);
    line.place(part("p", 80, 60), 100).unwrap();
    line.motor(Axis::Scanner).run_angle(1000, at).unwrap();
    let got = line.sensor(site).rgb().unwrap();
    let bg = SimLineCfg::default().backgrounds[usize::from(site == Site::Downstream)];
    assert_eq!(got != bg, seen, "at {at}");
}

#[test]
fn feeder_drops_parts_one_pitch_apart() {
    let (clock, line) = line(vec![part("a", 50, 50), part("b", 50, 50)]);
    let mut feeder = line.motor(Axis::Feeder);
    let mut belt = line.motor(Axis::Scanner);
    belt.run(600).unwrap();
    feeder.run(400).unwrap();
    clock.advance(Duration::from_millis(999));
    assert_eq!(line.on_belt(), 0);
    clock.advance(Duration::from_millis(2));
    assert_eq!(line.on_belt(), 1);
    clock.advance(Duration::from_millis(1000));
    assert_eq!(line.on_belt(), 2);
    assert_eq!(line.hopper_len(), 0);
}

#[test]
fn stopped_belt_blocks_the_next_drop() {
    let (clock, line) = line(vec![part("a", 50, 50), part("b", 50, 50)]);
    let mut feeder = line.motor(Axis::Feeder);
    feeder.run(800).unwrap();
    clock.advance(Duration::from_secs(3));
    assert_eq!(line.on_belt(), 1);
    assert_eq!(line.hopper_len(), 1);
}

#[test]
fn reversal_returns_parts_near_the_feeder() {
    let (_clock, line) = line(vec![]);
    line.place(part("p", 50, 50), 120).unwrap();
    let mut belt = line.motor(Axis::Scanner);
    belt.run_angle(900, -450).unwrap();
    assert_eq!(line.on_belt(), 0);
    assert_eq!(line.hopper_len(), 1);
    assert_eq!(line.returned(), 1);
}

#[test]
fn parts_leave_after_clearing_the_downstream_sensor() {
    let (_clock, line) = line(vec![]);
    line.place(part("p", 50, 50), 0).unwrap();
    let mut belt = line.motor(Axis::Scanner);
    belt.run_angle(1000, 237 + 50 + 200 + 1).unwrap();
    assert_eq!(line.delivered().len(), 1);
    assert_eq!(line.on_belt(), 0);
}

#[test]
fn run_angle_blocks_for_travel_time() {
    let (clock, line) = line(vec![]);
    let mut belt = line.motor(Axis::Scanner);
    belt.run_angle(900, -900).unwrap();
    assert_eq!(clock.elapsed(), Duration::from_secs(1));
    assert_eq!(belt.position().unwrap(), -900);
}

#[test]
fn run_target_records_seek_and_lands_on_target() {
    let (clock, line) = line(vec![]);
    let mut arm = line.motor(Axis::Arm);
    arm.run_target(1200, 1700, true).unwrap();
    arm.run_target(1200, 1100, false).unwrap();
    assert_eq!(arm.position().unwrap(), 1100);
    assert_eq!(line.seeks(), vec![(Axis::Arm, 1700), (Axis::Arm, 1100)]);
    assert!(clock.elapsed() >= Duration::from_millis(1416));
}
