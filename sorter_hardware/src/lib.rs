//! Backends for the sorting line: a simulated line for development and
//! tests, plus Raspberry Pi drivers behind the `hardware` feature.

pub mod error;
pub mod sim;
pub mod util;

#[cfg(feature = "hardware")]
pub mod stepper;
#[cfg(feature = "hardware")]
pub mod tcs34725;

pub use error::HwError;
pub use sim::{Axis, SimColorSensor, SimLine, SimLineCfg, SimMotor, SimPart, Site};

#[cfg(feature = "hardware")]
pub use stepper::Stepper;
#[cfg(feature = "hardware")]
pub use tcs34725::Tcs34725;
