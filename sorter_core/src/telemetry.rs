//! Ordered, retrying delivery of classification results.
//!
//! The downstream stage enqueues profile names on an unbounded channel and
//! never waits. The reporter thread delivers them in order; a refused
//! report is retried every `retry_ms` until the sink accepts it.

use std::collections::VecDeque;
use std::time::Duration;

use crossbeam_channel as xch;
use sorter_traits::TelemetrySink;
use tracing::{debug, warn};

use crate::config::TelemetryCfg;
use crate::error::Result;
use crate::line::LineCtx;

/// Wait used while the queue is empty.
const IDLE_WAIT: Duration = Duration::from_millis(50);

pub fn channel() -> (xch::Sender<String>, xch::Receiver<String>) {
    xch::unbounded()
}

pub struct Reporter<T: TelemetrySink> {
    sink: T,
    rx: xch::Receiver<String>,
    backlog: VecDeque<String>,
    retry: Duration,
}

impl<T: TelemetrySink> Reporter<T> {
    pub fn new(sink: T, rx: xch::Receiver<String>, cfg: &TelemetryCfg) -> Self {
        Self {
            sink,
            rx,
            backlog: VecDeque::new(),
            retry: Duration::from_millis(cfg.retry_ms.max(1)),
        }
    }

    /// Reports still waiting for the sink.
    pub fn backlog(&self) -> usize {
        self.backlog.len()
    }

    /// Move everything queued on the channel into the backlog. Returns
    /// false once the sender is gone and nothing is left.
    fn drain(&mut self) -> bool {
        loop {
            match self.rx.try_recv() {
                Ok(name) => self.backlog.push_back(name),
                Err(xch::TryRecvError::Empty) => return true,
                Err(xch::TryRecvError::Disconnected) => return !self.backlog.is_empty(),
            }
        }
    }

    /// Try to deliver the backlog in order. Returns true when it emptied.
    pub fn flush(&mut self) -> bool {
        self.drain();
        while let Some(front) = self.backlog.front() {
            match self.sink.report(front) {
                Ok(()) => {
                    debug!(profile = %front, "telemetry delivered");
                    self.backlog.pop_front();
                }
                Err(e) => {
                    warn!(profile = %front, error = %e, pending = self.backlog.len(), "telemetry refused; will retry");
                    return false;
                }
            }
        }
        true
    }

    /// Worker body: deliver until shutdown, then make one last attempt.
    pub fn run(mut self, ctx: &LineCtx) -> Result<()> {
        while !ctx.state.shutdown_requested() {
            if !self.flush() {
                ctx.clock.sleep(self.retry);
                continue;
            }
            match self.rx.recv_timeout(IDLE_WAIT) {
                Ok(name) => self.backlog.push_back(name),
                Err(xch::RecvTimeoutError::Timeout) => {}
                Err(xch::RecvTimeoutError::Disconnected) => {
                    if !self.drain() {
                        break;
                    }
                }
            }
        }
        if !self.flush() {
            warn!(dropped = self.backlog.len(), "telemetry backlog left at shutdown");
        }
        Ok(())
    }
}
