//! State shared between the line's worker threads.
//!
//! Every flag has exactly one writer: `reversing` and `generation` belong
//! to the downstream stage, `paused` to the pause sequencer and
//! `feed_speed` to the upstream stage. Shutdown may be requested by anyone.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sorter_traits::{Clock, Motor};

use crate::error::{Result, SorterError};
use crate::hw_error::lift;

#[derive(Debug, Default)]
pub struct LineState {
    reversing: AtomicBool,
    generation: AtomicU64,
    paused: AtomicBool,
    feed_speed: AtomicI32,
    shutdown: AtomicBool,
}

impl LineState {
    pub fn new(feed_speed: i32) -> Self {
        Self {
            feed_speed: AtomicI32::new(feed_speed),
            ..Self::default()
        }
    }

    pub fn reversing(&self) -> bool {
        self.reversing.load(Ordering::Acquire)
    }

    pub fn set_reversing(&self, on: bool) {
        self.reversing.store(on, Ordering::Release);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn set_generation(&self, generation: u64) {
        self.generation.store(generation, Ordering::Release);
    }

    pub fn paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn set_paused(&self, on: bool) {
        self.paused.store(on, Ordering::Release);
    }

    pub fn feed_speed(&self) -> i32 {
        self.feed_speed.load(Ordering::Acquire)
    }

    pub fn set_feed_speed(&self, speed: i32) {
        self.feed_speed.store(speed, Ordering::Release);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

/// Clock, epoch and shared flags handed to every worker.
#[derive(Clone)]
pub struct LineCtx {
    pub state: Arc<LineState>,
    pub clock: Arc<dyn Clock + Send + Sync>,
    pub epoch: Instant,
    /// Sleep between polls of a wait predicate.
    pub poll: Duration,
}

impl LineCtx {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>, state: Arc<LineState>, poll: Duration) -> Self {
        Self {
            epoch: clock.now(),
            state,
            clock,
            poll: poll.max(Duration::from_millis(1)),
        }
    }

    /// Milliseconds since the line epoch.
    pub fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    pub fn nap(&self) {
        self.clock.sleep(self.poll);
    }

    /// Sleep until `deadline_ms`. Returns false when shutdown cut it short.
    pub fn sleep_until(&self, deadline_ms: u64) -> bool {
        let state = Arc::clone(&self.state);
        self.clock.sleep_until_ms(
            self.epoch,
            deadline_ms,
            Duration::from_millis(20),
            &move || state.shutdown_requested(),
        )
    }
}

/// A motor shared between workers. Each call takes the lock for its own
/// duration only; a blocking move holds it until the move ends.
#[derive(Clone)]
pub struct MotorHandle {
    name: &'static str,
    inner: Arc<Mutex<Box<dyn Motor + Send>>>,
}

impl std::fmt::Debug for MotorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotorHandle").field("name", &self.name).finish()
    }
}

impl MotorHandle {
    pub fn new(name: &'static str, motor: Box<dyn Motor + Send>) -> Self {
        Self {
            name,
            inner: Arc::new(Mutex::new(motor)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn with<T>(&self, f: impl FnOnce(&mut dyn Motor) -> sorter_traits::HwResult<T>) -> Result<T> {
        let mut guard = self.inner.lock().map_err(|_| {
            eyre::Report::new(SorterError::State(format!("{} motor lock poisoned", self.name)))
        })?;
        lift(f(&mut **guard))
    }

    pub fn run(&self, speed: i32) -> Result<()> {
        self.with(|m| m.run(speed))
    }

    pub fn stop(&self) -> Result<()> {
        self.with(|m| m.stop())
    }

    pub fn brake(&self) -> Result<()> {
        self.with(|m| m.brake())
    }

    pub fn hold(&self) -> Result<()> {
        self.with(|m| m.hold())
    }

    pub fn position(&self) -> Result<i64> {
        self.with(|m| m.position())
    }

    pub fn reset_position(&self, value: i64) -> Result<()> {
        self.with(|m| m.reset_position(value))
    }

    pub fn run_angle(&self, speed: i32, delta: i64) -> Result<()> {
        self.with(|m| m.run_angle(speed, delta))
    }

    pub fn run_target(&self, speed: i32, target: i64, wait: bool) -> Result<()> {
        self.with(|m| m.run_target(speed, target, wait))
    }
}
