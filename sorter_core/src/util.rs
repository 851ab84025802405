//! Distance/speed/time helpers shared by the scheduler and the workers.

/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Milliseconds needed to cover `distance` degrees at `speed` deg/s.
/// - Uses the magnitude of both arguments.
/// - Clamps `speed` to at least 1 to avoid division by zero.
#[inline]
pub fn travel_ms(distance: i64, speed: i32) -> u64 {
    let speed = u64::from(speed.unsigned_abs().max(1));
    distance.unsigned_abs().saturating_mul(MILLIS_PER_SEC) / speed
}

/// Round to one decimal place.
#[inline]
pub fn round1(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}
