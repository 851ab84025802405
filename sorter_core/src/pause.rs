//! Operator Pause/Resume.
//!
//! Pause stops the feeder at once, the scanning belt `scanner_delay_ms`
//! later and the dropoff belt `dropoff_delay_ms` after that, so objects
//! already on the belts are still sorted. Resume cancels whatever stops
//! are still pending and restarts all three belts.

use std::collections::VecDeque;
use std::time::Duration;

use crossbeam_channel as xch;
use tracing::{debug, info};

use crate::config::PauseCfg;
use crate::error::Result;
use crate::line::{LineCtx, MotorHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeltAction {
    StopFeeder,
    StopScanner,
    StopDropoff,
    StartScanner,
    StartDropoff,
    StartFeeder,
}

/// Timing of the staged stop, free of any I/O.
#[derive(Debug, Clone)]
pub struct PauseSequencer {
    cfg: PauseCfg,
    paused: bool,
    pending: VecDeque<(u64, BeltAction)>,
}

impl PauseSequencer {
    pub fn new(cfg: PauseCfg) -> Self {
        Self {
            cfg,
            paused: false,
            pending: VecDeque::new(),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Apply a command; returns actions to take immediately.
    pub fn command(&mut self, cmd: Command, now_ms: u64) -> Vec<BeltAction> {
        match (cmd, self.paused) {
            (Command::Pause, false) => {
                self.paused = true;
                let scanner_at = now_ms.saturating_add(self.cfg.scanner_delay_ms);
                self.pending.clear();
                self.pending.push_back((scanner_at, BeltAction::StopScanner));
                self.pending.push_back((
                    scanner_at.saturating_add(self.cfg.dropoff_delay_ms),
                    BeltAction::StopDropoff,
                ));
                vec![BeltAction::StopFeeder]
            }
            (Command::Resume, true) => {
                self.paused = false;
                self.pending.clear();
                vec![
                    BeltAction::StartScanner,
                    BeltAction::StartDropoff,
                    BeltAction::StartFeeder,
                ]
            }
            _ => Vec::new(),
        }
    }

    /// Pop every timed action whose time has come.
    pub fn due(&mut self, now_ms: u64) -> Vec<BeltAction> {
        let mut out = Vec::new();
        while let Some(&(at, action)) = self.pending.front() {
            if at > now_ms {
                break;
            }
            self.pending.pop_front();
            out.push(action);
        }
        out
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.pending.front().map(|(at, _)| *at)
    }
}

/// Belts the pause worker drives and the speeds it restarts them at.
pub struct Belts {
    pub feeder: MotorHandle,
    pub scanner: MotorHandle,
    pub dropoff: MotorHandle,
    pub scan_speed: i32,
    pub dropoff_speed: i32,
}

impl Belts {
    fn apply(&self, ctx: &LineCtx, action: BeltAction) -> Result<()> {
        debug!(?action, "belt action");
        match action {
            BeltAction::StopFeeder => self.feeder.stop(),
            BeltAction::StopScanner => self.scanner.stop(),
            BeltAction::StopDropoff => self.dropoff.stop(),
            BeltAction::StartScanner => self.scanner.run(self.scan_speed),
            BeltAction::StartDropoff => self.dropoff.run(self.dropoff_speed),
            BeltAction::StartFeeder => self.feeder.run(ctx.state.feed_speed()),
        }
    }
}

const IDLE_WAIT: Duration = Duration::from_millis(50);

/// Worker body: the only writer of the `paused` flag.
pub fn run(
    ctx: &LineCtx,
    mut seq: PauseSequencer,
    belts: &Belts,
    commands: &xch::Receiver<Command>,
) -> Result<()> {
    while !ctx.state.shutdown_requested() {
        let now = ctx.now_ms();
        for action in seq.due(now) {
            belts.apply(ctx, action)?;
        }
        let wait = seq
            .next_deadline()
            .map_or(IDLE_WAIT, |at| {
                Duration::from_millis(at.saturating_sub(now)).min(IDLE_WAIT)
            });
        match commands.recv_timeout(wait) {
            Ok(cmd) => {
                let actions = seq.command(cmd, ctx.now_ms());
                ctx.state.set_paused(seq.is_paused());
                if !actions.is_empty() {
                    info!(?cmd, "operator command");
                }
                for action in actions {
                    belts.apply(ctx, action)?;
                }
            }
            Err(xch::RecvTimeoutError::Timeout) => {}
            Err(xch::RecvTimeoutError::Disconnected) => {
                if seq.next_deadline().is_none() {
                    break;
                }
                ctx.nap();
            }
        }
    }
    Ok(())
}
