//! Inbound events for the two node services.
//!
//! Connectivity changes, decoded broker messages, sensor samples and loop
//! ticks all arrive as one tagged event per node, dispatched into a single
//! `handle()` entrypoint on [`LevelNode`](super::service::LevelNode) or
//! [`PumpNode`](super::service::PumpNode).  Event sourcing (MQTT callbacks,
//! GPIO polling, timers) stays in the adapters.

use crate::level::SensorVector;

/// Decoded pump command fields.
///
/// `action` is kept as the raw string: only `"stop"` is special, and any
/// other value is evaluated as a start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpCommand {
    pub action: String,
    pub run_seconds: i32,
    pub request_id: String,
}

impl PumpCommand {
    pub fn start(run_seconds: i32, request_id: &str) -> Self {
        Self {
            action: "start".to_owned(),
            run_seconds,
            request_id: request_id.to_owned(),
        }
    }

    pub fn stop(request_id: &str) -> Self {
        Self {
            action: crate::pump::ACTION_STOP.to_owned(),
            run_seconds: 0,
            request_id: request_id.to_owned(),
        }
    }
}

/// Everything the pump node reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpNodeEvent {
    /// Broker session established.
    Connected,
    /// Broker session lost.
    Disconnected,
    /// Remote command on the pump command topic.
    Command(PumpCommand),
    /// Water level report from the level node (`-1` = unknown).
    WaterLevel(i32),
    /// One control loop iteration.
    Tick,
}

/// Everything the level node reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelNodeEvent {
    Connected,
    Disconnected,
    /// One poll of the level switch bank.
    Sample(SensorVector),
}
