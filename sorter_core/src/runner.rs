//! Line lifecycle: prime, start the workers, pause/resume, shut down.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel as xch;
use sorter_traits::{Clock, ColorSensor, TelemetrySink};
use tracing::info;

use crate::builder::SorterBuilder;
use crate::calibration::BackgroundModel;
use crate::config::LineCfg;
use crate::dispatch::Dispatcher;
use crate::error::{Result, SorterError};
use crate::line::{LineCtx, LineState, MotorHandle};
use crate::pause::{self, Belts, Command, PauseSequencer};
use crate::profile::{CountsSnapshot, ProfileCounters, ProfileTable};
use crate::stage::{DownstreamLinks, DownstreamStage, UpstreamStage};
use crate::telemetry::{self, Reporter};
use crate::types::Stage;
use crate::worker::Worker;

/// A fully assembled, not yet running line.
pub struct Sorter {
    pub(crate) cfg: LineCfg,
    pub(crate) background: BackgroundModel,
    pub(crate) profiles: Arc<ProfileTable>,
    pub(crate) counters: Arc<ProfileCounters>,
    pub(crate) upstream: Box<dyn ColorSensor + Send>,
    pub(crate) downstream: Box<dyn ColorSensor + Send>,
    pub(crate) scanner: MotorHandle,
    pub(crate) feeder: MotorHandle,
    pub(crate) dropoff: MotorHandle,
    pub(crate) arm: MotorHandle,
    pub(crate) telemetry: Box<dyn TelemetrySink + Send>,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) on_summary: Option<Box<dyn Fn(&CountsSnapshot) + Send>>,
}

impl std::fmt::Debug for Sorter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sorter")
            .field("profiles", &self.profiles.len())
            .field("background", &self.background.to_flat())
            .finish_non_exhaustive()
    }
}

impl Sorter {
    pub fn builder() -> SorterBuilder {
        SorterBuilder::new()
    }

    pub fn config(&self) -> &LineCfg {
        &self.cfg
    }

    pub fn profiles(&self) -> &Arc<ProfileTable> {
        &self.profiles
    }

    pub fn counters(&self) -> &Arc<ProfileCounters> {
        &self.counters
    }

    /// Empty the scanning belt, park the arm and re-zero the belt.
    pub fn prime(&self) -> Result<()> {
        info!("priming line");
        let scan = &self.cfg.scan;
        self.scanner
            .run_angle(scan.reverse_speed, scan.reject_distance)?;
        self.arm.run_target(
            self.cfg.dispatch.arm_speed,
            self.cfg.dispatch.park_position,
            true,
        )?;
        self.scanner.reset_position(0)?;
        Ok(())
    }

    /// Start the belts and every worker.
    pub fn start(self) -> Result<RunningLine> {
        let cfg = self.cfg;
        let state = Arc::new(LineState::new(cfg.feed.nominal_speed));
        let ctx = LineCtx::new(
            self.clock,
            Arc::clone(&state),
            Duration::from_millis(cfg.scan.poll_ms),
        );

        let (rec_tx, rec_rx) = xch::unbounded();
        let (order_tx, order_rx) = xch::unbounded();
        let (tel_tx, tel_rx) = telemetry::channel();
        let (cmd_tx, cmd_rx) = xch::unbounded();

        self.scanner.run(cfg.scan.speed)?;
        self.dropoff.run(cfg.dispatch.dropoff_speed)?;
        self.feeder.run(cfg.feed.nominal_speed)?;
        info!(
            scan_speed = cfg.scan.speed,
            feed_speed = cfg.feed.nominal_speed,
            profiles = self.profiles.len(),
            "line started"
        );

        let upstream = UpstreamStage::new(
            ctx.clone(),
            &cfg,
            self.background.bounds(Stage::Upstream),
            self.upstream,
            self.scanner.clone(),
            self.feeder.clone(),
            rec_tx,
        );
        let downstream = DownstreamStage::new(
            ctx.clone(),
            &cfg,
            self.background.bounds(Stage::Downstream),
            self.downstream,
            self.scanner.clone(),
            self.feeder.clone(),
            Arc::clone(&self.profiles),
            Arc::clone(&self.counters),
            DownstreamLinks {
                input: rec_rx,
                orders: order_tx,
                telemetry: tel_tx,
            },
        );
        let dispatcher = Dispatcher::new(
            self.arm.clone(),
            cfg.dispatch.arm_speed,
            order_rx,
            Arc::clone(&self.counters),
        );
        let reporter = Reporter::new(self.telemetry, tel_rx, &cfg.telemetry);
        let belts = Belts {
            feeder: self.feeder.clone(),
            scanner: self.scanner.clone(),
            dropoff: self.dropoff.clone(),
            scan_speed: cfg.scan.speed,
            dropoff_speed: cfg.dispatch.dropoff_speed,
        };
        let sequencer = PauseSequencer::new(cfg.pause.clone());

        let mut workers = Vec::with_capacity(6);
        workers.push(Worker::spawn("upstream", Arc::clone(&state), move || upstream.run())?);
        workers.push(Worker::spawn("downstream", Arc::clone(&state), move || downstream.run())?);
        let c = ctx.clone();
        workers.push(Worker::spawn("dispatch", Arc::clone(&state), move || dispatcher.run(&c))?);
        let c = ctx.clone();
        workers.push(Worker::spawn("telemetry", Arc::clone(&state), move || reporter.run(&c))?);
        let c = ctx.clone();
        workers.push(Worker::spawn("pause", Arc::clone(&state), move || {
            pause::run(&c, sequencer, &belts, &cmd_rx)
        })?);
        if let Some(show) = self.on_summary {
            let c = ctx.clone();
            let profiles = Arc::clone(&self.profiles);
            let counters = Arc::clone(&self.counters);
            let every = cfg.display.interval_ms.max(1);
            workers.push(Worker::spawn("display", Arc::clone(&state), move || {
                let mut next = every;
                while c.sleep_until(next) {
                    show(&counters.snapshot(&profiles));
                    next += every;
                }
                Ok(())
            })?);
        }

        Ok(RunningLine {
            ctx,
            commands: cmd_tx,
            profiles: self.profiles,
            counters: self.counters,
            belts: [self.feeder, self.scanner, self.dropoff],
            workers,
        })
    }
}

/// Handle to a running line. Dropping it stops and joins every worker.
pub struct RunningLine {
    ctx: LineCtx,
    commands: xch::Sender<Command>,
    profiles: Arc<ProfileTable>,
    counters: Arc<ProfileCounters>,
    belts: [MotorHandle; 3],
    workers: Vec<Worker>,
}

impl RunningLine {
    pub fn command(&self, cmd: Command) -> Result<()> {
        self.commands
            .send(cmd)
            .map_err(|_| eyre::Report::new(SorterError::State("pause worker is gone".into())))
    }

    pub fn pause(&self) -> Result<()> {
        self.command(Command::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.command(Command::Resume)
    }

    /// Sender for feeding commands from another thread (stdin, network).
    pub fn commands(&self) -> xch::Sender<Command> {
        self.commands.clone()
    }

    pub fn snapshot(&self) -> CountsSnapshot {
        self.counters.snapshot(&self.profiles)
    }

    pub fn is_paused(&self) -> bool {
        self.ctx.state.paused()
    }

    /// False once shutdown was requested or any worker has stopped.
    pub fn is_running(&self) -> bool {
        !self.ctx.state.shutdown_requested() && !self.workers.iter().any(Worker::is_finished)
    }

    /// Milliseconds since the line started.
    pub fn uptime_ms(&self) -> u64 {
        self.ctx.now_ms()
    }

    /// Stop every worker and belt. Returns the first worker error.
    pub fn shutdown(mut self) -> Result<()> {
        info!("line shutting down");
        self.ctx.state.request_shutdown();
        let mut first = None;
        for w in self.workers.drain(..) {
            let name = w.name();
            if let Err(e) = w.join() {
                tracing::error!(worker = name, error = %e, "worker error");
                first.get_or_insert(e);
            }
        }
        for belt in &self.belts {
            if let Err(e) = belt.stop() {
                tracing::warn!(motor = belt.name(), error = %e, "failed to stop belt");
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
