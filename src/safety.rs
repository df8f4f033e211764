//! Water level safety interlock for the pump node.
//!
//! The pump may only **start** when the reservoir level is:
//!
//! 1. known (at least one observation received since boot),
//! 2. fresh (observed within the configured stale threshold), and
//! 3. non-zero (an empty reservoir is a known, fresh, unsafe reading).
//!
//! The interlock is consulted only when evaluating a start request.
//! Stop paths (explicit stop, run timeout, connection loss) never consult
//! it: a stale or missing level must never keep the pump running.

/// Sentinel percentage meaning "no observation yet".
pub const LEVEL_UNKNOWN: i32 = -1;

/// Result of checking the interlock at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterlockStatus {
    /// No water level observation has been received (or the last one was negative).
    Unknown,
    /// The last observation is older than the stale threshold.
    Stale,
    /// Fresh observation reporting an empty reservoir.
    Empty,
    /// Fresh, non-zero level: a start is permitted.
    Safe,
}

impl InterlockStatus {
    pub fn is_safe(self) -> bool {
        self == Self::Safe
    }
}

/// Latest water level observation plus the stale threshold it is judged by.
#[derive(Debug, Clone)]
pub struct WaterLevelInterlock {
    last_percent: i32,
    last_seen_ms: u32,
    stale_ms: u32,
}

impl WaterLevelInterlock {
    pub fn new(stale_ms: u32) -> Self {
        Self {
            last_percent: LEVEL_UNKNOWN,
            last_seen_ms: 0,
            stale_ms,
        }
    }

    /// Record an observation.  No range validation: the level node is trusted,
    /// and a negative value simply marks the level unknown again.
    pub fn observe(&mut self, percent: i32, now_ms: u32) {
        self.last_percent = percent;
        self.last_seen_ms = now_ms;
    }

    pub fn is_known(&self) -> bool {
        self.last_percent >= 0
    }

    /// Unknown counts as stale.  Age uses wrapping `u32` subtraction.
    pub fn is_stale(&self, now_ms: u32) -> bool {
        if !self.is_known() {
            return true;
        }
        now_ms.wrapping_sub(self.last_seen_ms) > self.stale_ms
    }

    pub fn is_safe(&self, now_ms: u32) -> bool {
        self.status(now_ms).is_safe()
    }

    /// Classify the interlock; the first failing condition wins.
    pub fn status(&self, now_ms: u32) -> InterlockStatus {
        if !self.is_known() {
            InterlockStatus::Unknown
        } else if self.is_stale(now_ms) {
            InterlockStatus::Stale
        } else if self.last_percent == 0 {
            InterlockStatus::Empty
        } else {
            InterlockStatus::Safe
        }
    }

    pub fn last_percent(&self) -> i32 {
        self.last_percent
    }

    pub fn last_seen_ms(&self) -> u32 {
        self.last_seen_ms
    }
}
