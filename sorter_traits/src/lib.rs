//! Hardware seams for the sorting line.
//!
//! Everything the core needs from the machine goes through these traits so
//! the pipeline can run against the simulation backend, real drivers, or
//! scripted test doubles. Errors cross the boundary as boxed trait objects;
//! `sorter_core::hw_error` maps them back to typed errors.

pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Boxed error used at every trait boundary.
pub type HwResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// One instantaneous read of the three color channels (red, green, blue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rgb(pub [i32; 3]);

impl Rgb {
    pub const fn new(r: i32, g: i32, b: i32) -> Self {
        Self([r, g, b])
    }

    #[inline]
    pub fn channels(&self) -> &[i32; 3] {
        &self.0
    }
}

/// Pull-based color sensor. Each call blocks until a fresh sample exists.
pub trait ColorSensor {
    fn rgb(&mut self) -> HwResult<Rgb>;
}

/// Encoder-equipped motor: conveyor belts and the swing arm.
///
/// Positions and distances are encoder degrees; speeds are degrees per second.
pub trait Motor {
    /// Run continuously at `speed` until told otherwise.
    fn run(&mut self, speed: i32) -> HwResult<()>;
    /// Cut power and coast to a standstill.
    fn stop(&mut self) -> HwResult<()>;
    /// Stop actively (short-circuit brake).
    fn brake(&mut self) -> HwResult<()>;
    /// Stop and actively hold the current position.
    fn hold(&mut self) -> HwResult<()>;
    /// Current encoder position.
    fn position(&mut self) -> HwResult<i64>;
    /// Redefine the current encoder position without moving.
    fn reset_position(&mut self, value: i64) -> HwResult<()>;
    /// Move by `delta` relative to the current position, blocking until done.
    fn run_angle(&mut self, speed: i32, delta: i64) -> HwResult<()>;
    /// Seek an absolute `target` and hold there. Blocks when `wait` is set.
    fn run_target(&mut self, speed: i32, target: i64, wait: bool) -> HwResult<()>;
}

/// Listener for classification results (another process, a log, ...).
pub trait TelemetrySink {
    /// Deliver one profile name. An `Err` means "not accepted, retry later".
    fn report(&mut self, profile: &str) -> HwResult<()>;
}

impl<T: ColorSensor + ?Sized> ColorSensor for Box<T> {
    fn rgb(&mut self) -> HwResult<Rgb> {
        (**self).rgb()
    }
}

impl<T: Motor + ?Sized> Motor for Box<T> {
    fn run(&mut self, speed: i32) -> HwResult<()> {
        (**self).run(speed)
    }
    fn stop(&mut self) -> HwResult<()> {
        (**self).stop()
    }
    fn brake(&mut self) -> HwResult<()> {
        (**self).brake()
    }
    fn hold(&mut self) -> HwResult<()> {
        (**self).hold()
    }
    fn position(&mut self) -> HwResult<i64> {
        (**self).position()
    }
    fn reset_position(&mut self, value: i64) -> HwResult<()> {
        (**self).reset_position(value)
    }
    fn run_angle(&mut self, speed: i32, delta: i64) -> HwResult<()> {
        (**self).run_angle(speed, delta)
    }
    fn run_target(&mut self, speed: i32, target: i64, wait: bool) -> HwResult<()> {
        (**self).run_target(speed, target, wait)
    }
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Box<T> {
    fn report(&mut self, profile: &str) -> HwResult<()> {
        (**self).report(profile)
    }
}
