//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ LevelNode / PumpNode (domain)
//! ```
//!
//! Driven adapters (GPIO, relay, MQTT client, clocks, event sinks)
//! implement these traits.  The node services consume them via generics,
//! so the decision logic never touches hardware or the network directly.

use crate::error::{CommsError, HardwareError};
use crate::level::SensorVector;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port for the level switch bank.
pub trait LevelSensorPort {
    /// Sample every switch once, lowest first.
    fn read_levels(&mut self) -> Result<SensorVector, HardwareError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the pump relay.
pub trait RelayPort {
    /// Energise (`true`) or release (`false`) the pump relay.
    fn set_relay(&mut self, on: bool) -> Result<(), HardwareError>;
}

// ───────────────────────────────────────────────────────────────
// Messaging port (driven adapter: domain ↔ broker)
// ───────────────────────────────────────────────────────────────

/// Outbound half of the MQTT connection.  Inbound traffic arrives as
/// node events instead (see [`super::commands`]).
///
/// All operations use QoS 1.
pub trait MqttPort {
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), CommsError>;

    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError>;
}

// ───────────────────────────────────────────────────────────────
// Time ports
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond counter.  Wraps at `u32::MAX` like Arduino
/// `millis()`; consumers must use wrapping subtraction.
pub trait MonotonicClock {
    fn now_ms(&self) -> u32;
}

/// Wall-clock source for human-readable timestamps in published state.
pub trait WallClock {
    /// Current UTC time as `YYYY-MM-DDTHH:MM:SSZ`.
    fn iso_utc_now(&self) -> String;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
