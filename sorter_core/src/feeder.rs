//! Feeder speed ramp.
//!
//! While the upstream stage sees an empty belt the feeder speeds up one
//! `ramp_step` per `idle_ms`, capped at `max_speed`. An arriving object
//! drops it back to nominal. Nothing ramps while the line is paused.

use crate::config::FeedCfg;

#[derive(Debug, Clone)]
pub struct FeedGovernor {
    cfg: FeedCfg,
    speed: i32,
    since_ms: u64,
}

impl FeedGovernor {
    pub fn new(cfg: FeedCfg, now_ms: u64) -> Self {
        Self {
            speed: cfg.nominal_speed,
            cfg,
            since_ms: now_ms,
        }
    }

    pub fn speed(&self) -> i32 {
        self.speed
    }

    /// Called while waiting for an object. Returns the new speed when a
    /// ramp step happened.
    pub fn idle(&mut self, now_ms: u64, paused: bool) -> Option<i32> {
        if paused {
            self.since_ms = now_ms;
            return None;
        }
        if now_ms.saturating_sub(self.since_ms) < self.cfg.idle_ms {
            return None;
        }
        self.since_ms = now_ms;
        if self.speed >= self.cfg.max_speed {
            return None;
        }
        self.speed = self
            .speed
            .saturating_add(self.cfg.ramp_step)
            .min(self.cfg.max_speed);
        Some(self.speed)
    }

    /// Called on Enter. Returns the nominal speed when it should be
    /// applied to the feeder now.
    pub fn object_seen(&mut self, now_ms: u64, paused: bool) -> Option<i32> {
        self.speed = self.cfg.nominal_speed;
        self.since_ms = now_ms;
        (!paused).then_some(self.speed)
    }
}
