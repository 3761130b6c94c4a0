//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Computes the wait before the attempt following `retry_count` failures.
///
/// The curve is `base · 2^retry_count`, capped at `max`, with up to ±25%
/// jitter applied and the result clamped back into `[base, max]` so the
/// wait never undercuts the floor nor exceeds the cap.
pub fn backoff_delay(retry_count: u32, base: Duration, max: Duration) -> Duration {
    jittered(retry_count, base, max, rand::thread_rng().gen_range(-1.0..=1.0))
}

/// Backoff curve with an explicit jitter factor in `[-1, 1]`.
///
/// Split out so the curve itself is deterministic under test.
fn jittered(retry_count: u32, base: Duration, max: Duration, jitter: f64) -> Duration {
    if base.is_zero() {
        return Duration::ZERO;
    }

    let exponent = retry_count.min(32);
    let raw = base.as_secs_f64() * 2f64.powi(exponent as i32);
    let capped = raw.min(max.as_secs_f64());
    let with_jitter = capped + capped * 0.25 * jitter;

    Duration::from_secs_f64(with_jitter.clamp(base.as_secs_f64(), max.as_secs_f64()))
}
