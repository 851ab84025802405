//! Simulated sorting line.
//!
//! One shared [`SimLine`] models the scanning belt in its own frame: each
//! part sits at a fixed belt coordinate and the two color sensors look at
//! fixed points, the downstream one `sensor_gap` degrees further along.
//! Axis positions integrate `speed * dt` lazily whenever anything touches
//! the world, so the simulation runs on whatever [`Clock`] it is given
//! (real time in the CLI, a `ManualClock` in tests).
//!
//! The feeder drops the next hopper part onto the belt every `feed_pitch`
//! feeder degrees, provided it keeps `clearance` to the previous part.
//! Reversing the belt past the drop point returns parts to the hopper;
//! running far enough past the downstream sensor delivers them to the arm.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use sorter_traits::{Clock, ColorSensor, HwResult, Motor, Rgb};

use crate::error::HwError;
use crate::util::travel_time;

/// A part with the reading each sensor produces while it is in view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimPart {
    pub label: String,
    /// Visible length under the upstream and downstream sensor.
    pub lengths: [i64; 2],
    /// Reading under the upstream and downstream sensor.
    pub colors: [Rgb; 2],
}

#[derive(Debug, Clone)]
pub struct SimLineCfg {
    /// Empty-belt readings for the upstream (white) and downstream (black) sensor.
    pub backgrounds: [Rgb; 2],
    pub sensor_gap: i64,
    /// Belt distance from the feeder drop point to the upstream sensor.
    pub lead_in: i64,
    pub feed_pitch: i64,
    pub clearance: i64,
    /// Distance past the downstream sensor after which a part leaves the belt.
    pub exit_distance: i64,
    /// Time one sensor read takes.
    pub sample_period: Duration,
}

impl Default for SimLineCfg {
    fn default() -> Self {
        Self {
            backgrounds: [Rgb::new(17, 28, 31), Rgb::new(1, 3, 10)],
            sensor_gap: 237,
            lead_in: 150,
            feed_pitch: 400,
            clearance: 120,
            exit_distance: 200,
            sample_period: Duration::from_millis(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Feeder,
    Scanner,
    Dropoff,
    Arm,
}

impl Axis {
    const fn idx(self) -> usize {
        match self {
            Axis::Feeder => 0,
            Axis::Scanner => 1,
            Axis::Dropoff => 2,
            Axis::Arm => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    Upstream,
    Downstream,
}

#[derive(Debug, Default, Clone, Copy)]
struct AxisState {
    pos: f64,
    speed: f64,
    zero: f64,
}

#[derive(Debug)]
struct OnBelt {
    part: SimPart,
    x: f64,
}

#[derive(Debug)]
struct World {
    cfg: SimLineCfg,
    axes: [AxisState; 4],
    last: Instant,
    hopper: VecDeque<SimPart>,
    belt: Vec<OnBelt>,
    delivered: Vec<SimPart>,
    returned: usize,
    feed_acc: f64,
    seeks: Vec<(Axis, i64)>,
}

impl World {
    fn advance(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.last).as_secs_f64();
        self.last = now;
        if dt > 0.0 {
            for axis in &mut self.axes {
                axis.pos += axis.speed * dt;
            }
            let fed = self.axes[Axis::Feeder.idx()].speed * dt;
            if fed > 0.0 {
                self.feed_acc += fed;
            }
        }
        self.settle();
    }

    fn scanner(&self) -> f64 {
        self.axes[Axis::Scanner.idx()].pos
    }

    fn settle(&mut self) {
        let pos = self.scanner();
        let lead_in = self.cfg.lead_in as f64;
        let gap = self.cfg.sensor_gap as f64;
        let exit = self.cfg.exit_distance as f64;

        // reversed past the drop point: back into the hopper
        let mut i = 0;
        while i < self.belt.len() {
            if self.belt[i].x > pos + lead_in + 0.5 {
                let back = self.belt.remove(i);
                tracing::trace!(label = %back.part.label, "sim part returned to hopper");
                self.hopper.push_back(back.part);
                self.returned += 1;
            } else if pos > self.belt[i].x + gap + self.belt[i].part.lengths[1] as f64 + exit {
                let done = self.belt.remove(i);
                tracing::trace!(label = %done.part.label, "sim part left the scanner");
                self.delivered.push(done.part);
            } else {
                i += 1;
            }
        }

        let pitch = self.cfg.feed_pitch.max(1) as f64;
        while self.feed_acc >= pitch {
            if self.hopper.is_empty() {
                self.feed_acc = pitch;
                break;
            }
            let x = pos + lead_in;
            let blocked = self.belt.iter().any(|b| {
                let longest = b.part.lengths[0].max(b.part.lengths[1]) as f64;
                x < b.x + longest + self.cfg.clearance as f64
            });
            if blocked {
                self.feed_acc = pitch;
                break;
            }
            if let Some(part) = self.hopper.pop_front() {
                tracing::trace!(label = %part.label, x, "sim part dropped on belt");
                self.belt.push(OnBelt { part, x });
            }
            self.feed_acc -= pitch;
        }
    }

    fn color_at(&self, site: Site) -> Rgb {
        let pos = self.scanner();
        let (shift, stage) = match site {
            Site::Upstream => (0.0, 0),
            Site::Downstream => (self.cfg.sensor_gap as f64, 1),
        };
        self.belt
            .iter()
            .find(|b| {
                let from = b.x + shift;
                pos >= from && pos < from + b.part.lengths[stage] as f64
            })
            .map_or(self.cfg.backgrounds[stage], |b| b.part.colors[stage])
    }
}

/// Handle to one simulated line; cheap to clone.
#[derive(Clone)]
pub struct SimLine {
    world: Arc<Mutex<World>>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl SimLine {
    pub fn new(
        cfg: SimLineCfg,
        clock: Arc<dyn Clock + Send + Sync>,
        parts: impl IntoIterator<Item = SimPart>,
    ) -> Self {
        let world = World {
            cfg,
            axes: [AxisState::default(); 4],
            last: clock.now(),
            hopper: parts.into_iter().collect(),
            belt: Vec::new(),
            delivered: Vec::new(),
            returned: 0,
            feed_acc: 0.0,
            seeks: Vec::new(),
        };
        Self {
            world: Arc::new(Mutex::new(world)),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, World>, HwError> {
        let mut w = self
            .world
            .lock()
            .map_err(|_| HwError::Io(std::io::Error::other("sim world lock poisoned")))?;
        w.advance(self.clock.now());
        Ok(w)
    }

    pub fn sensor(&self, site: Site) -> SimColorSensor {
        SimColorSensor {
            line: self.clone(),
            site,
        }
    }

    pub fn motor(&self, axis: Axis) -> SimMotor {
        SimMotor {
            line: self.clone(),
            axis,
        }
    }

    /// Put `part` on the belt so its leading edge reaches the upstream
    /// sensor when the scanner encoder reads `encoder`.
    pub fn place(&self, part: SimPart, encoder: i64) -> Result<(), HwError> {
        let mut w = self.lock()?;
        let zero = w.axes[Axis::Scanner.idx()].zero;
        w.belt.push(OnBelt {
            part,
            x: encoder as f64 + zero,
        });
        Ok(())
    }

    /// Parts that have left the scanning belt towards the arm, in order.
    pub fn delivered(&self) -> Vec<SimPart> {
        self.lock().map(|w| w.delivered.clone()).unwrap_or_default()
    }

    /// Number of parts still waiting in the hopper.
    pub fn hopper_len(&self) -> usize {
        self.lock().map(|w| w.hopper.len()).unwrap_or(0)
    }

    /// Number of parts currently on the scanning belt.
    pub fn on_belt(&self) -> usize {
        self.lock().map(|w| w.belt.len()).unwrap_or(0)
    }

    /// How many times a reversal sent a part back to the hopper.
    pub fn returned(&self) -> usize {
        self.lock().map(|w| w.returned).unwrap_or(0)
    }

    /// Absolute seeks issued so far (`run_target`), oldest first.
    pub fn seeks(&self) -> Vec<(Axis, i64)> {
        self.lock().map(|w| w.seeks.clone()).unwrap_or_default()
    }

    /// Current commanded speed of `axis` (0 when stopped).
    pub fn speed(&self, axis: Axis) -> i32 {
        self.lock()
            .map(|w| w.axes[axis.idx()].speed.round() as i32)
            .unwrap_or(0)
    }
}

pub struct SimColorSensor {
    line: SimLine,
    site: Site,
}

impl ColorSensor for SimColorSensor {
    fn rgb(&mut self) -> HwResult<Rgb> {
        let period = self.line.lock()?.cfg.sample_period;
        self.line.clock.sleep(period);
        let w = self.line.lock()?;
        let c = w.color_at(self.site);
        tracing::trace!(site = ?self.site, rgb = ?c.0, "sim sample");
        Ok(c)
    }
}

pub struct SimMotor {
    line: SimLine,
    axis: Axis,
}

impl SimMotor {
    fn set_speed(&mut self, speed: f64) -> HwResult<()> {
        let mut w = self.line.lock()?;
        w.axes[self.axis.idx()].speed = speed;
        Ok(())
    }

    /// Stop the axis, wait out the travel time, then jump to `to` (absolute, raw).
    fn travel(&mut self, speed: i32, distance: i64, to: impl FnOnce(f64) -> f64) -> HwResult<()> {
        self.set_speed(0.0)?;
        self.line.clock.sleep(travel_time(distance, speed));
        let mut w = self.line.lock()?;
        let axis = &mut w.axes[self.axis.idx()];
        axis.pos = to(axis.pos);
        w.settle();
        Ok(())
    }
}

impl Motor for SimMotor {
    fn run(&mut self, speed: i32) -> HwResult<()> {
        self.set_speed(f64::from(speed))
    }

    fn stop(&mut self) -> HwResult<()> {
        self.set_speed(0.0)
    }

    fn brake(&mut self) -> HwResult<()> {
        self.set_speed(0.0)
    }

    fn hold(&mut self) -> HwResult<()> {
        self.set_speed(0.0)
    }

    fn position(&mut self) -> HwResult<i64> {
        let w = self.line.lock()?;
        let a = w.axes[self.axis.idx()];
        Ok((a.pos - a.zero).round() as i64)
    }

    fn reset_position(&mut self, value: i64) -> HwResult<()> {
        let mut w = self.line.lock()?;
        let a = &mut w.axes[self.axis.idx()];
        a.zero = a.pos - value as f64;
        Ok(())
    }

    fn run_angle(&mut self, speed: i32, delta: i64) -> HwResult<()> {
        self.travel(speed, delta, |pos| pos + delta as f64)
    }

    fn run_target(&mut self, speed: i32, target: i64, wait: bool) -> HwResult<()> {
        let (current, zero) = {
            let mut w = self.line.lock()?;
            w.seeks.push((self.axis, target));
            let a = w.axes[self.axis.idx()];
            (a.pos - a.zero, a.zero)
        };
        let raw = target as f64 + zero;
        if wait {
            let distance = (target as f64 - current).round() as i64;
            self.travel(speed, distance, |_| raw)
        } else {
            self.set_speed(0.0)?;
            let mut w = self.line.lock()?;
            w.axes[self.axis.idx()].pos = raw;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sorter_traits::ManualClock;

    fn part(len: i64) -> SimPart {
        SimPart {
            label: "t".into(),
            lengths: [len, len],
            colors: [Rgb::new(2, 2, 0), Rgb::new(0, 0, 0)],
        }
    }

    #[test]
    fn belt_position_integrates_speed() {
        let clock = ManualClock::new();
        let line = SimLine::new(SimLineCfg::default(), Arc::new(clock.clone()), []);
        let mut belt = line.motor(Axis::Scanner);
        belt.run(600).unwrap();
        clock.advance(Duration::from_millis(500));
        assert_eq!(belt.position().unwrap(), 300);
        belt.stop().unwrap();
        clock.advance(Duration::from_millis(500));
        assert_eq!(belt.position().unwrap(), 300);
    }

    #[test]
    fn reset_position_rezeroes_without_moving_parts() {
        let clock = ManualClock::new();
        let line = SimLine::new(SimLineCfg::default(), Arc::new(clock.clone()), []);
        line.place(part(50), 100).unwrap();
        let mut belt = line.motor(Axis::Scanner);
        belt.run_angle(900, 90).unwrap();
        belt.reset_position(0).unwrap();
        assert_eq!(belt.position().unwrap(), 0);
        // part leading edge is now 10 degrees ahead
        belt.run_angle(900, 15).unwrap();
        let mut up = line.sensor(Site::Upstream);
        assert_eq!(up.rgb().unwrap(), Rgb::new(2, 2, 0));
    }
}
