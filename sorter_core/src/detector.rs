//! Boundary detection against a background model.
//!
//! An object enters after `debounce` consecutive anomalous samples and
//! starts at the position of the first of them; it exits at the first
//! sample whose channels are all back in range. With a maximum length
//! set, an object still present past `start + max_length` exits
//! immediately, flagged over-length.

use sorter_traits::Rgb;
use tracing::trace;

use crate::calibration::ChannelBounds;
use crate::types::{DetectionEvent, EventKind, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Clear { run: u8, first: i64 },
    Inside { start: i64 },
}

#[derive(Debug, Clone)]
pub struct BoundaryDetector {
    stage: Stage,
    bounds: ChannelBounds,
    debounce: u8,
    max_length: Option<i64>,
    state: State,
}

impl BoundaryDetector {
    pub fn new(stage: Stage, bounds: ChannelBounds, debounce: u8) -> Self {
        Self {
            stage,
            bounds,
            debounce: debounce.max(1),
            max_length: None,
            state: State::Clear { run: 0, first: 0 },
        }
    }

    #[must_use]
    pub fn with_max_length(mut self, max_length: i64) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Feed one sample taken at `position`.
    pub fn push(&mut self, rgb: Rgb, position: i64) -> Option<DetectionEvent> {
        let anomalous = self.bounds.is_anomalous(rgb);
        trace!(stage = self.stage.name(), position, rgb = ?rgb.0, anomalous, "sample");
        match self.state {
            State::Clear { run, first } => {
                if !anomalous {
                    self.state = State::Clear { run: 0, first: 0 };
                    return None;
                }
                let first = if run == 0 { position } else { first };
                let run = run.saturating_add(1);
                if run >= self.debounce {
                    self.state = State::Inside { start: first };
                    return Some(self.event(first, EventKind::Enter));
                }
                self.state = State::Clear { run, first };
                None
            }
            State::Inside { start } => {
                if !anomalous {
                    self.reset();
                    return Some(self.event(position, EventKind::Exit { over_length: false }));
                }
                match self.max_length {
                    Some(max) if position > start.saturating_add(max) => {
                        self.reset();
                        Some(self.event(position, EventKind::Exit { over_length: true }))
                    }
                    _ => None,
                }
            }
        }
    }

    /// Start of the object currently in view, if any.
    pub fn inside(&self) -> Option<i64> {
        match self.state {
            State::Inside { start } => Some(start),
            State::Clear { .. } => None,
        }
    }

    /// True when no anomalous run is in progress.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Clear { run: 0, .. })
    }

    /// Forget any partial run or object in view.
    pub fn reset(&mut self) {
        self.state = State::Clear { run: 0, first: 0 };
    }

    fn event(&self, position: i64, kind: EventKind) -> DetectionEvent {
        DetectionEvent {
            stage: self.stage,
            position,
            kind,
        }
    }
}
