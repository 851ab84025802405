use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Poll `is_ready` until it reports true, or fail with `DataReadyTimeout`.
/// Sleeps `poll_interval` between polls to avoid CPU spinning; errors from
/// the predicate are returned as-is.
pub fn wait_until_ready_with_timeout(
    mut is_ready: impl FnMut() -> Result<bool>,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while !is_ready()? {
        if Instant::now() >= deadline {
            return Err(HwError::DataReadyTimeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}

/// Time needed to travel `distance` degrees at `speed` deg/s.
///
/// A non-positive speed is treated as 1 deg/s so callers never divide by zero.
pub fn travel_time(distance: i64, speed: i32) -> Duration {
    let speed = f64::from(speed.unsigned_abs().max(1));
    Duration::from_secs_f64(distance.unsigned_abs() as f64 / speed)
}
