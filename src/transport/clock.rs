//! Monotonic millisecond clock with a 16-bit wire form.

use std::sync::OnceLock;
use std::time::Instant;

use crate::core::TIMESTAMP_NONE;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Milliseconds since the process-wide monotonic epoch. Never decreases.
pub fn now_ms() -> u64 {
    EPOCH.get_or_init(Instant::now).elapsed().as_millis() as u64
}

/// The 16-bit wire timestamp: `now_ms() mod 65536`.
///
/// `0xFFFF` is reserved as the "no timestamp" sentinel, so a clock reading
/// that lands on it is reported as zero.
pub fn now_ms16() -> u16 {
    let ts = now_ms() as u16;
    if ts == TIMESTAMP_NONE {
        0
    } else {
        ts
    }
}

/// Wrap-safe difference between two 16-bit timestamps.
pub fn ts_diff(new: u16, old: u16) -> u16 {
    new.wrapping_sub(old)
}
