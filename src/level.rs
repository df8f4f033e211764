//! Water level aggregation and publish gating for the level sensor node.
//!
//! Four non-contact level switches are stacked in the reservoir.  Each
//! reads `true` when water covers it, so the number of covered switches
//! maps directly to a coarse fill percentage.
//!
//! The [`LevelAggregator`] decides when a reading is worth publishing:
//!
//! ```text
//!   Idle ──(changed ∨ heartbeat due)──▶ Publish ──mark_published──▶ Idle
//! ```
//!
//! A failed publish must **not** call [`LevelAggregator::mark_published`],
//! which leaves the gate open so the next loop iteration retries.

use serde::{Deserialize, Serialize};

/// Number of level switches on the reservoir.
pub const SENSOR_COUNT: usize = 4;

/// One boolean per level switch, lowest switch first.
pub type SensorVector = [bool; SENSOR_COUNT];

/// A derived reading: raw switch states plus the fill percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub sensors: SensorVector,
    /// Always one of 0, 25, 50, 75, 100.
    pub level_percent: i32,
}

/// Change detection and on-change-else-heartbeat publish policy.
#[derive(Debug, Clone)]
pub struct LevelAggregator {
    last_sensors: SensorVector,
    last_publish_ms: u32,
    publish_interval_ms: u32,
}

impl LevelAggregator {
    /// Baseline is all-false, so the first covered switch counts as a change.
    pub fn new(publish_interval_ms: u32) -> Self {
        Self {
            last_sensors: [false; SENSOR_COUNT],
            last_publish_ms: 0,
            publish_interval_ms,
        }
    }

    /// Count covered switches and scale to a percentage (integer truncation).
    pub fn build_snapshot(&self, sensors: SensorVector) -> LevelSnapshot {
        let covered = sensors.iter().filter(|&&wet| wet).count() as i32;
        LevelSnapshot {
            sensors,
            level_percent: covered * 100 / SENSOR_COUNT as i32,
        }
    }

    /// True if `sensors` differs from the last published vector.
    pub fn has_changed(&self, sensors: SensorVector) -> bool {
        sensors != self.last_sensors
    }

    /// Publish on change, otherwise once the heartbeat interval has elapsed.
    ///
    /// Uses wrapping subtraction so a `millis()` rollover does not stall
    /// the heartbeat.
    pub fn should_publish(&self, changed: bool, now_ms: u32) -> bool {
        changed || now_ms.wrapping_sub(self.last_publish_ms) >= self.publish_interval_ms
    }

    /// Record a successful publish.
    pub fn mark_published(&mut self, sensors: SensorVector, now_ms: u32) {
        self.last_sensors = sensors;
        self.last_publish_ms = now_ms;
    }

    pub fn last_sensors(&self) -> SensorVector {
        self.last_sensors
    }

    pub fn last_publish_ms(&self) -> u32 {
        self.last_publish_ms
    }

    pub fn publish_interval_ms(&self) -> u32 {
        self.publish_interval_ms
    }
}
