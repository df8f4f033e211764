//! Outbound application events.
//!
//! The node services emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them — log to serial, forward elsewhere.

use crate::level::LevelSnapshot;
use crate::safety::InterlockStatus;

/// Which firmware image is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Level,
    Pump,
}

/// Why the pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// Explicit `"stop"` command.
    Command,
    /// Requested run duration elapsed.
    Timeout,
    /// Broker link lost while running.
    ConnectionLost,
    /// Relay rejected the start drive.
    RelayFault,
}

/// Why a start request produced no action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefusalReason {
    WaterLevelUnknown,
    WaterLevelStale,
    ReservoirEmpty,
    /// `runSeconds` missing, zero or negative.
    InvalidDuration,
}

impl RefusalReason {
    /// Map an interlock verdict to a refusal; `Safe` is not a refusal.
    pub fn from_interlock(status: InterlockStatus) -> Option<Self> {
        match status {
            InterlockStatus::Unknown => Some(Self::WaterLevelUnknown),
            InterlockStatus::Stale => Some(Self::WaterLevelStale),
            InterlockStatus::Empty => Some(Self::ReservoirEmpty),
            InterlockStatus::Safe => None,
        }
    }
}

/// Structured events emitted by the node services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The node service has started.
    Started(NodeKind),

    /// Broker session established.
    Connected,

    /// Broker session lost.
    Disconnected,

    /// Relay energised for a timed run.
    PumpStarted { run_seconds: u32, request_id: String },

    /// Relay released.
    PumpStopped { request_id: String, cause: StopCause },

    /// A start request was not acted upon.
    CommandRefused { request_id: String, reason: RefusalReason },

    /// New water level observation recorded by the pump node.
    WaterLevelObserved(i32),

    /// Level node published a reading.
    LevelPublished(LevelSnapshot),

    /// A publish or subscribe to the named topic failed.
    PublishFailed(&'static str),

    /// Inbound payload on the named topic could not be decoded.
    PayloadRejected(&'static str),
}
