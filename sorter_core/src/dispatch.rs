//! Swing-arm worker: executes dispatch orders in FIFO order at their due
//! time and counts each object once the arm is in place.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel as xch;
use tracing::{debug, info};

use crate::error::Result;
use crate::line::{LineCtx, MotorHandle};
use crate::profile::ProfileCounters;
use crate::types::ProfileId;

const IDLE_WAIT: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOrder {
    pub index: usize,
    pub profile: ProfileId,
    pub name: String,
    pub position: i64,
    /// When the arm should start moving (ms since the line epoch).
    pub due_ms: u64,
}

pub struct Dispatcher {
    arm: MotorHandle,
    arm_speed: i32,
    orders: xch::Receiver<DispatchOrder>,
    counters: Arc<ProfileCounters>,
}

impl Dispatcher {
    pub fn new(
        arm: MotorHandle,
        arm_speed: i32,
        orders: xch::Receiver<DispatchOrder>,
        counters: Arc<ProfileCounters>,
    ) -> Self {
        Self {
            arm,
            arm_speed,
            orders,
            counters,
        }
    }

    /// Wait for the order's due time, swing, count. Returns false when
    /// shutdown interrupted the wait.
    pub fn execute(&self, ctx: &LineCtx, order: &DispatchOrder) -> Result<bool> {
        if !ctx.sleep_until(order.due_ms) {
            return Ok(false);
        }
        let late_ms = ctx.now_ms().saturating_sub(order.due_ms);
        debug!(index = order.index, position = order.position, late_ms, "arm moving");
        self.arm.run_target(self.arm_speed, order.position, true)?;
        self.counters.record(order.profile);
        info!(index = order.index, profile = %order.name, "object dispatched");
        Ok(true)
    }

    pub fn run(self, ctx: &LineCtx) -> Result<()> {
        while !ctx.state.shutdown_requested() {
            match self.orders.recv_timeout(IDLE_WAIT) {
                Ok(order) => {
                    if !self.execute(ctx, &order)? {
                        break;
                    }
                }
                Err(xch::RecvTimeoutError::Timeout) => {}
                Err(xch::RecvTimeoutError::Disconnected) => break,
            }
        }
        Ok(())
    }
}
