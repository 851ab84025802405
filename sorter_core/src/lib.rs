#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core sorting logic (hardware-agnostic).
//!
//! This crate provides the sensing-and-classification pipeline of the part
//! sorter. All hardware interactions go through `sorter_traits::ColorSensor`,
//! `sorter_traits::Motor` and `sorter_traits::TelemetrySink`.
//!
//! ## Architecture
//!
//! - **Calibration**: background range per sensor and channel (`calibration`)
//! - **Detection**: debounced Enter/Exit against that range (`detector`)
//! - **Extraction**: averaged upstream, single downstream sample (`extractor`)
//! - **Tracking**: index-based fusion of both stages (`tracker`)
//! - **Matching**: ordered first-match profile table (`profile`)
//! - **Recovery**: rescan or reject after indeterminate results (`rescan`)
//! - **Dispatch**: swing-arm timing and the arm worker (`scheduler`, `dispatch`)
//! - **Runtime**: stages, workers and lifecycle (`stage`, `worker`, `runner`)
//!
//! Positions are scanning-belt encoder degrees; times are milliseconds
//! since the line epoch taken from the injected `Clock`.

pub mod builder;
pub mod calibration;
pub mod config;
pub mod conversions;
pub mod detector;
pub mod dispatch;
pub mod error;
pub mod extractor;
pub mod feeder;
pub mod hw_error;
pub mod line;
pub mod mocks;
pub mod pause;
pub mod profile;
pub mod rescan;
pub mod runner;
pub mod scheduler;
pub mod stage;
pub mod status;
pub mod telemetry;
pub mod tracker;
pub mod types;
pub mod util;
pub mod worker;

pub use builder::SorterBuilder;
pub use calibration::{BackgroundModel, ChannelBounds, FACTORY_DEFAULTS, OPERATING_DEFAULTS};
pub use config::LineCfg;
pub use error::{BuildError, Result, SorterError};
pub use pause::Command;
pub use profile::{CountsSnapshot, ObjectProfile, ProfileCounters, ProfileTable};
pub use runner::{RunningLine, Sorter};
pub use status::StepOutcome;
pub use types::{Features, FusedObject, Outcome, ProfileId, Stage, StageRecord};
