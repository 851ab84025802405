//! Swing-arm dispatch timing.
//!
//! Each classified object reaches the arm `transit` after it leaves the
//! scanner. The arm must start moving `swing` before that, and two moves
//! to different positions must start at least `min_gap` apart. When the
//! next object would arrive too early the scanner is held (a stall) until
//! `prev_arrival + min_gap + swing`.

use crate::config::DispatchCfg;
use crate::util::travel_ms;

/// Whether an object may be released now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Clear,
    /// Hold the scanner until this time (ms since the line epoch).
    StallUntil(u64),
}

/// Timing committed for one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub arrival_ms: u64,
    pub swing_ms: u64,
    /// When the arm starts moving.
    pub due_ms: u64,
}

#[derive(Debug, Clone)]
pub struct DispatchScheduler {
    cfg: DispatchCfg,
    transit_ms: u64,
    /// Position and arrival of the last committed object.
    last: Option<(i64, u64)>,
}

impl DispatchScheduler {
    pub fn new(cfg: DispatchCfg) -> Self {
        Self {
            transit_ms: travel_ms(cfg.dropoff_distance, cfg.dropoff_speed),
            cfg,
            last: None,
        }
    }

    pub fn transit_ms(&self) -> u64 {
        self.transit_ms
    }

    /// Arm travel time from the previous position to `position`.
    pub fn swing_ms(&self, position: i64) -> u64 {
        match self.last {
            None => self.cfg.first_swing_ms,
            Some((prev, _)) => travel_ms(position - prev, self.cfg.arm_speed),
        }
    }

    pub fn check(&self, position: i64, now_ms: u64) -> Slot {
        let Some((prev, prev_arrival)) = self.last else {
            return Slot::Clear;
        };
        if prev == position {
            return Slot::Clear;
        }
        let safe = prev_arrival
            .saturating_add(self.cfg.min_gap_ms)
            .saturating_add(self.swing_ms(position));
        if now_ms < safe {
            Slot::StallUntil(safe)
        } else {
            Slot::Clear
        }
    }

    /// Record the object as arrived at `arrival_ms`.
    pub fn commit(&mut self, position: i64, arrival_ms: u64) -> Schedule {
        let swing_ms = self.swing_ms(position);
        let due_ms = arrival_ms
            .saturating_add(self.transit_ms)
            .saturating_sub(swing_ms);
        self.last = Some((position, arrival_ms));
        Schedule {
            arrival_ms,
            swing_ms,
            due_ms,
        }
    }
}
