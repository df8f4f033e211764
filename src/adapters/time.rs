//! ESP32 clock adapter.
//!
//! Implements [`MonotonicClock`] and [`WallClock`].
//!
//! - **`target_os = "espidf"`** — monotonic time from `esp_timer_get_time()`
//!   (microsecond precision since boot).
//! - **`not(target_os = "espidf")`** — `std::time::Instant` for host-side
//!   tests and simulation.
//!
//! Wall-clock time comes from the system clock on both targets; on the
//! device it is only meaningful once SNTP has synced.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::DateTime;

use crate::app::ports::{MonotonicClock, WallClock};

/// Anything earlier than this (2023-11-14) means SNTP has not synced yet.
pub const MIN_VALID_EPOCH_SECS: i64 = 1_700_000_000;

/// Reported in place of an unsynced wall clock.
pub const UNSYNCED_ISO: &str = "1970-01-01T00:00:00Z";

/// Format Unix seconds as `YYYY-MM-DDTHH:MM:SSZ`, or [`UNSYNCED_ISO`] if
/// the value predates [`MIN_VALID_EPOCH_SECS`].
pub fn iso_utc(epoch_secs: i64) -> String {
    if epoch_secs < MIN_VALID_EPOCH_SECS {
        return UNSYNCED_ISO.to_owned();
    }
    DateTime::from_timestamp(epoch_secs, 0).map_or_else(
        || UNSYNCED_ISO.to_owned(),
        |t| t.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    )
}

/// Clock adapter for the ESP32-S3 platform.
pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl MonotonicClock for SystemClock {
    /// Truncated to 32 bits; wraps after ~49.7 days.
    fn now_ms(&self) -> u32 {
        (self.uptime_us() / 1000) as u32
    }
}

impl WallClock for SystemClock {
    fn iso_utc_now(&self) -> String {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() as i64);
        iso_utc(secs)
    }
}
