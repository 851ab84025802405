//! The two sensing stages.
//!
//! The upstream stage watches the white-background sensor, drives the
//! feeder ramp and hands one `StageRecord` per object to the downstream
//! stage. The downstream stage owns the tracker, the matcher, the
//! scheduler and the rescan policy, and is the only one that reverses
//! the scanning belt.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel as xch;
use sorter_traits::{ColorSensor, Rgb};
use tracing::{debug, info, warn};

use crate::calibration::ChannelBounds;
use crate::config::{ExtractorCfg, LineCfg, ScanCfg};
use crate::detector::BoundaryDetector;
use crate::dispatch::DispatchOrder;
use crate::error::{Result, SorterError};
use crate::extractor;
use crate::feeder::FeedGovernor;
use crate::hw_error::lift;
use crate::line::{LineCtx, MotorHandle};
use crate::profile::{ProfileCounters, ProfileTable};
use crate::rescan::{Recovery, RescanPolicy};
use crate::scheduler::{DispatchScheduler, Slot};
use crate::status::StepOutcome;
use crate::tracker::Tracker;
use crate::types::{EventKind, Outcome, OVER_LENGTH, ProfileId, Stage, StageRecord};

const IDLE_WAIT: Duration = Duration::from_millis(50);

fn gone(what: &str) -> eyre::Report {
    eyre::Report::new(SorterError::State(format!("{what} is gone")))
}

pub struct UpstreamStage {
    ctx: LineCtx,
    sensor: Box<dyn ColorSensor + Send>,
    scanner: MotorHandle,
    feeder: MotorHandle,
    detector: BoundaryDetector,
    governor: FeedGovernor,
    extractor: ExtractorCfg,
    out: xch::Sender<StageRecord>,
}

impl UpstreamStage {
    pub fn new(
        ctx: LineCtx,
        cfg: &LineCfg,
        bounds: ChannelBounds,
        sensor: Box<dyn ColorSensor + Send>,
        scanner: MotorHandle,
        feeder: MotorHandle,
        out: xch::Sender<StageRecord>,
    ) -> Self {
        let governor = FeedGovernor::new(cfg.feed.clone(), ctx.now_ms());
        Self {
            detector: BoundaryDetector::new(Stage::Upstream, bounds, cfg.detector.debounce),
            governor,
            extractor: cfg.extractor.clone(),
            ctx,
            sensor,
            scanner,
            feeder,
            out,
        }
    }

    fn sample(&mut self) -> Result<(Rgb, i64)> {
        let rgb = lift(self.sensor.rgb())?;
        let pos = self.scanner.position()?;
        Ok((rgb, pos))
    }

    fn interrupted(&self, generation: u64) -> bool {
        let s = &self.ctx.state;
        s.shutdown_requested() || s.reversing() || s.generation() != generation
    }

    fn abandon(&mut self, start: Option<i64>) -> Option<StageRecord> {
        self.detector.reset();
        debug!(?start, "upstream scan abandoned");
        None
    }

    fn ramp_feeder(&mut self) -> Result<()> {
        let state = &self.ctx.state;
        if let Some(speed) = self.governor.idle(self.ctx.now_ms(), state.paused()) {
            self.feeder.run(speed)?;
            state.set_feed_speed(speed);
            debug!(speed, "feeder ramped up");
        }
        Ok(())
    }

    /// Scan one object. Returns `None` when the scan was abandoned
    /// (reversal, rescan, shutdown).
    pub fn scan_one(&mut self) -> Result<Option<StageRecord>> {
        let state = Arc::clone(&self.ctx.state);
        if state.shutdown_requested() {
            return Ok(None);
        }
        if state.reversing() {
            while state.reversing() && !state.shutdown_requested() {
                self.ctx.nap();
            }
            return Ok(self.abandon(None));
        }
        let generation = state.generation();

        let start = loop {
            if self.interrupted(generation) {
                return Ok(self.abandon(None));
            }
            let (rgb, pos) = self.sample()?;
            if let Some(ev) = self.detector.push(rgb, pos) {
                if ev.kind == EventKind::Enter {
                    break ev.position;
                }
            }
            if self.detector.is_idle() {
                self.ramp_feeder()?;
            }
        };
        if let Some(speed) = self.governor.object_seen(self.ctx.now_ms(), state.paused()) {
            self.feeder.run(speed)?;
        }
        state.set_feed_speed(self.governor.speed());

        // The detector keeps watching for the trailing edge while the belt
        // moves to the sampling window; a short object may leave before it.
        let from = start + self.extractor.upstream_offset;
        let mut end = None;
        loop {
            if self.interrupted(generation) {
                return Ok(self.abandon(Some(start)));
            }
            let (rgb, pos) = self.sample()?;
            if end.is_none() {
                end = self.detector.push(rgb, pos).map(|ev| ev.position);
            }
            if pos >= from {
                break;
            }
        }

        let want = self.extractor.upstream_samples.max(1);
        let mut samples = Vec::with_capacity(want);
        while samples.len() < want {
            if self.interrupted(generation) {
                return Ok(self.abandon(Some(start)));
            }
            let (rgb, pos) = self.sample()?;
            if end.is_none() {
                end = self.detector.push(rgb, pos).map(|ev| ev.position);
            }
            samples.push(rgb);
        }
        let end = match end {
            Some(e) => e,
            None => loop {
                if self.interrupted(generation) {
                    return Ok(self.abandon(Some(start)));
                }
                let (rgb, pos) = self.sample()?;
                if let Some(ev) = self.detector.push(rgb, pos) {
                    break ev.position;
                }
            },
        };
        if self.interrupted(generation) {
            return Ok(self.abandon(Some(start)));
        }

        let record = StageRecord {
            generation,
            start,
            length: end - start,
            features: extractor::average(&samples),
        };
        debug!(
            start,
            length = record.length,
            features = ?record.features.0,
            samples = samples.len(),
            "upstream object"
        );
        self.out
            .send(record.clone())
            .map_err(|_| gone("downstream stage"))?;
        Ok(Some(record))
    }

    pub fn run(mut self) -> Result<()> {
        info!("upstream stage running");
        while !self.ctx.state.shutdown_requested() {
            self.scan_one()?;
        }
        Ok(())
    }
}

/// Channels connecting the downstream stage to its neighbours.
pub struct DownstreamLinks {
    pub input: xch::Receiver<StageRecord>,
    pub orders: xch::Sender<DispatchOrder>,
    pub telemetry: xch::Sender<String>,
}

pub struct DownstreamStage {
    ctx: LineCtx,
    sensor: Box<dyn ColorSensor + Send>,
    scanner: MotorHandle,
    feeder: MotorHandle,
    detector: BoundaryDetector,
    extractor: ExtractorCfg,
    scan: ScanCfg,
    tracker: Tracker,
    policy: RescanPolicy,
    scheduler: DispatchScheduler,
    profiles: Arc<ProfileTable>,
    counters: Arc<ProfileCounters>,
    links: DownstreamLinks,
    upstream_gone: bool,
}

impl DownstreamStage {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ctx: LineCtx,
        cfg: &LineCfg,
        bounds: ChannelBounds,
        sensor: Box<dyn ColorSensor + Send>,
        scanner: MotorHandle,
        feeder: MotorHandle,
        profiles: Arc<ProfileTable>,
        counters: Arc<ProfileCounters>,
        links: DownstreamLinks,
    ) -> Self {
        Self {
            ctx,
            sensor,
            scanner,
            feeder,
            detector: BoundaryDetector::new(Stage::Downstream, bounds, cfg.detector.debounce)
                .with_max_length(cfg.detector.max_length),
            extractor: cfg.extractor.clone(),
            scan: cfg.scan.clone(),
            tracker: Tracker::new(),
            policy: RescanPolicy::new(&cfg.rescan, &cfg.scan),
            scheduler: DispatchScheduler::new(cfg.dispatch.clone()),
            profiles,
            counters,
            links,
            upstream_gone: false,
        }
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn policy(&self) -> &RescanPolicy {
        &self.policy
    }

    fn sample(&mut self) -> Result<(Rgb, i64)> {
        let rgb = lift(self.sensor.rgb())?;
        let pos = self.scanner.position()?;
        Ok((rgb, pos))
    }

    /// Start of the upstream record the next object will be fused with,
    /// waiting for one to arrive.
    fn await_upstream(&mut self) -> Option<i64> {
        loop {
            if let Some(r) = self.tracker.next_pending() {
                return Some(r.start);
            }
            if self.ctx.state.shutdown_requested() {
                return None;
            }
            match self.links.input.recv_timeout(IDLE_WAIT) {
                Ok(rec) => {
                    self.tracker.accept(rec);
                }
                Err(xch::RecvTimeoutError::Timeout) => {}
                Err(xch::RecvTimeoutError::Disconnected) => {
                    self.upstream_gone = true;
                    return None;
                }
            }
        }
    }

    /// Scan, classify and dispatch or recover one object.
    pub fn process_one(&mut self) -> Result<StepOutcome> {
        let Some(up_start) = self.await_upstream() else {
            return Ok(StepOutcome::Idle);
        };
        let state = Arc::clone(&self.ctx.state);

        let start = loop {
            if state.shutdown_requested() {
                return Ok(StepOutcome::Idle);
            }
            let (rgb, pos) = self.sample()?;
            if let Some(ev) = self.detector.push(rgb, pos) {
                if ev.kind == EventKind::Enter {
                    break ev.position;
                }
            }
        };

        let at = up_start + self.extractor.downstream_offset;
        loop {
            if state.shutdown_requested() {
                return Ok(StepOutcome::Idle);
            }
            if self.scanner.position()? >= at {
                break;
            }
            self.ctx.nap();
        }
        let (rgb, pos) = self.sample()?;
        let features = extractor::single(rgb);
        let mut exit = self.detector.push(rgb, pos);
        while exit.is_none() {
            if state.shutdown_requested() {
                return Ok(StepOutcome::Idle);
            }
            let (rgb, pos) = self.sample()?;
            exit = self.detector.push(rgb, pos);
        }
        let length = match exit.map(|ev| ev.kind) {
            Some(EventKind::Exit { over_length: true }) => {
                debug!(start, "downstream object over-length");
                OVER_LENGTH
            }
            _ => exit.map_or(0, |ev| ev.position) - start,
        };

        let record = StageRecord {
            generation: self.tracker.generation(),
            start,
            length,
            features,
        };
        debug!(start, length, features = ?features.0, "downstream object");
        let index = self
            .tracker
            .fuse(record)
            .ok_or_else(|| eyre::Report::new(SorterError::State("no upstream record to fuse".into())))?;
        let outcome = self
            .tracker
            .get(index)
            .map_or(Outcome::Indeterminate, |obj| self.profiles.classify(obj));
        self.tracker.set_outcome(index, outcome);

        match outcome {
            Outcome::Matched(id) => self.dispatch(index, id),
            Outcome::Indeterminate => self.recover(index),
        }
    }

    fn dispatch(&mut self, index: usize, id: ProfileId) -> Result<StepOutcome> {
        self.policy.on_success();
        let (name, position) = self
            .profiles
            .get(id)
            .map(|p| (p.name.clone(), p.position))
            .ok_or_else(|| eyre::Report::new(SorterError::State(format!("unknown profile {}", id.0))))?;

        if let Slot::StallUntil(until) = self.scheduler.check(position, self.ctx.now_ms()) {
            self.stall(until)?;
        }
        let arrival = self.ctx.now_ms();
        let sch = self.scheduler.commit(position, arrival);
        self.tracker.set_dispatch(index, arrival, sch.due_ms);
        info!(index, profile = %name, position, swing_ms = sch.swing_ms, due_ms = sch.due_ms, "object classified");

        self.links
            .orders
            .send(DispatchOrder {
                index,
                profile: id,
                name: name.clone(),
                position,
                due_ms: sch.due_ms,
            })
            .map_err(|_| gone("dispatch worker"))?;
        if self.links.telemetry.send(name).is_err() {
            warn!(index, "telemetry reporter gone; result not reported");
        }
        Ok(StepOutcome::Sorted {
            index,
            profile: id,
            due_ms: sch.due_ms,
        })
    }

    /// Hold the scanner (and feeder) until the arm may take the next object.
    fn stall(&self, until_ms: u64) -> Result<()> {
        info!(hold_ms = until_ms.saturating_sub(self.ctx.now_ms()), "dispatch gap; holding scanner");
        self.scanner.brake()?;
        self.feeder.stop()?;
        self.ctx.sleep_until(until_ms);
        self.restart_belts(false)
    }

    /// Restart what `stall` or `recover` stopped. A pause that arrived in
    /// the meantime keeps the belts stopped; Resume restarts them.
    fn restart_belts(&self, scanner_only: bool) -> Result<()> {
        let state = &self.ctx.state;
        if state.paused() {
            debug!("line paused; belts stay stopped");
            return Ok(());
        }
        self.scanner.run(self.scan.speed)?;
        if !scanner_only {
            self.feeder.run(state.feed_speed())?;
        }
        Ok(())
    }

    fn recover(&mut self, index: usize) -> Result<StepOutcome> {
        let action = self.policy.on_indeterminate();
        let state = &self.ctx.state;
        warn!(index, ?action, "indeterminate object");

        self.scanner.brake()?;
        state.set_reversing(true);
        self.scanner
            .run_angle(self.scan.reverse_speed, action.distance())?;
        let generation = self.tracker.truncate_at(index);
        state.set_generation(generation);
        self.detector.reset();
        self.scanner.reset_position(0)?;
        state.set_reversing(false);
        self.restart_belts(true)?;

        Ok(match action {
            Recovery::Rescan { .. } => {
                self.counters.record_rescan();
                StepOutcome::Rescanned { index }
            }
            Recovery::Reject { .. } => {
                self.counters.record_reject();
                StepOutcome::Rejected { index }
            }
        })
    }

    pub fn run(mut self) -> Result<()> {
        info!("downstream stage running");
        while !self.ctx.state.shutdown_requested() && !self.upstream_gone {
            self.process_one()?;
        }
        Ok(())
    }
}
