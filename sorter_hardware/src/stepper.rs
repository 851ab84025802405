//! Step/dir stepper driver exposed as an encoder motor.
//!
//! A background thread owns the pins and emits pulses at the commanded
//! rate. Position is counted in steps and converted to degrees with
//! `steps_per_degree`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rppal::gpio::{Gpio, OutputPin};
use sorter_traits::{HwResult, Motor};

use crate::error::{HwError, Result};

const NO_TARGET: i64 = i64::MIN;
const IDLE_POLL: Duration = Duration::from_millis(1);

#[derive(Debug, Default)]
struct Shared {
    steps: AtomicI64,
    /// Signed steps per second.
    rate: AtomicI64,
    target: AtomicI64,
    shutdown: AtomicBool,
}

pub struct Stepper {
    shared: Arc<Shared>,
    steps_per_degree: f32,
    zero: i64,
    handle: Option<JoinHandle<()>>,
}

impl Stepper {
    pub fn new(step_pin: u8, dir_pin: u8, steps_per_degree: f32) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let step = gpio
            .get(step_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output_low();
        let dir = gpio
            .get(dir_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output_low();
        let shared = Arc::new(Shared {
            target: AtomicI64::new(NO_TARGET),
            ..Shared::default()
        });
        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(format!("stepper-{step_pin}"))
            .spawn(move || pulse_loop(&worker, step, dir))?;
        Ok(Self {
            shared,
            steps_per_degree: steps_per_degree.max(f32::EPSILON),
            zero: 0,
            handle: Some(handle),
        })
    }

    fn to_steps(&self, degrees: i64) -> i64 {
        (degrees as f32 * self.steps_per_degree).round() as i64
    }

    fn to_degrees(&self, steps: i64) -> i64 {
        (steps as f32 / self.steps_per_degree).round() as i64
    }

    fn seek(&mut self, speed: i32, target_steps: i64, wait: bool) {
        let rate = self.to_steps(i64::from(speed)).abs().max(1);
        self.shared.target.store(target_steps, Ordering::Release);
        self.shared.rate.store(rate, Ordering::Release);
        if wait {
            while self.shared.target.load(Ordering::Acquire) != NO_TARGET {
                thread::sleep(IDLE_POLL);
            }
        }
    }

    fn halt(&mut self) {
        self.shared.target.store(NO_TARGET, Ordering::Release);
        self.shared.rate.store(0, Ordering::Release);
    }
}

fn pulse_loop(shared: &Shared, mut step: OutputPin, mut dir: OutputPin) {
    while !shared.shutdown.load(Ordering::Acquire) {
        let rate = shared.rate.load(Ordering::Acquire);
        let target = shared.target.load(Ordering::Acquire);
        let here = shared.steps.load(Ordering::Acquire);
        let forward = if target == NO_TARGET {
            if rate == 0 {
                thread::sleep(IDLE_POLL);
                continue;
            }
            rate > 0
        } else if target == here {
            shared.rate.store(0, Ordering::Release);
            shared.target.store(NO_TARGET, Ordering::Release);
            continue;
        } else {
            target > here
        };
        if forward {
            dir.set_high();
        } else {
            dir.set_low();
        }
        let half = Duration::from_secs_f64(0.5 / rate.unsigned_abs().max(1) as f64);
        step.set_high();
        thread::sleep(half);
        step.set_low();
        shared
            .steps
            .fetch_add(if forward { 1 } else { -1 }, Ordering::AcqRel);
        thread::sleep(half);
    }
    step.set_low();
}

impl Motor for Stepper {
    fn run(&mut self, speed: i32) -> HwResult<()> {
        self.shared.target.store(NO_TARGET, Ordering::Release);
        let rate = self.to_steps(i64::from(speed));
        self.shared.rate.store(rate, Ordering::Release);
        Ok(())
    }

    fn stop(&mut self) -> HwResult<()> {
        self.halt();
        Ok(())
    }

    fn brake(&mut self) -> HwResult<()> {
        self.halt();
        Ok(())
    }

    fn hold(&mut self) -> HwResult<()> {
        self.halt();
        Ok(())
    }

    fn position(&mut self) -> HwResult<i64> {
        let steps = self.shared.steps.load(Ordering::Acquire);
        Ok(self.to_degrees(steps) - self.zero)
    }

    fn reset_position(&mut self, value: i64) -> HwResult<()> {
        let steps = self.shared.steps.load(Ordering::Acquire);
        self.zero = self.to_degrees(steps) - value;
        Ok(())
    }

    fn run_angle(&mut self, speed: i32, delta: i64) -> HwResult<()> {
        let target = self.shared.steps.load(Ordering::Acquire) + self.to_steps(delta);
        self.seek(speed, target, true);
        Ok(())
    }

    fn run_target(&mut self, speed: i32, target: i64, wait: bool) -> HwResult<()> {
        let target = self.to_steps(target + self.zero);
        self.seek(speed, target, wait);
        Ok(())
    }
}

impl Drop for Stepper {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}
