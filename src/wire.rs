//! JSON payloads and topic layout on the broker.
//!
//! ```text
//!   <prefix>/WateringController/pump/cmd           ──▶ pump node
//!   <prefix>/WateringController/pump/state         ◀── pump node (retained)
//!   <prefix>/WateringController/waterlevel/state   ◀── level node (retained)
//!                                                  ──▶ pump node
//! ```
//!
//! Field names are camelCase on the wire.  Missing or mistyped inbound
//! fields fall back to safe defaults: no action means `"start"`, no
//! duration means 0 (which the interlock refuses), no level means unknown.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::commands::{PumpCommand, PumpNodeEvent};
use crate::error::WireError;
use crate::level::{LevelSnapshot, SensorVector};
use crate::pump::PumpState;
use crate::safety::LEVEL_UNKNOWN;

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

/// The three topics the rig uses, built once from the configured prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub pump_cmd: String,
    pub pump_state: String,
    pub water_level: String,
}

impl Topics {
    pub fn new(prefix: &str) -> Self {
        let base = format!("{}/WateringController", prefix.trim_end_matches('/'));
        Self {
            pump_cmd: format!("{base}/pump/cmd"),
            pump_state: format!("{base}/pump/state"),
            water_level: format!("{base}/waterlevel/state"),
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Action assumed when a command carries none.
const DEFAULT_ACTION: &str = "start";

/// Water level report published by the level node.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterLevelPayload {
    pub level_percent: i32,
    pub sensors: SensorVector,
    pub measured_at: String,
    pub reported_at: String,
}

impl WaterLevelPayload {
    pub fn from_snapshot(snapshot: &LevelSnapshot, now_iso: String) -> Self {
        Self {
            level_percent: snapshot.level_percent,
            sensors: snapshot.sensors,
            measured_at: now_iso.clone(),
            reported_at: now_iso,
        }
    }
}

/// Outbound pump state report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PumpStatePayload {
    pub running: bool,
    /// Start timestamp while running, `null` otherwise.
    pub since: Option<String>,
    pub last_run_seconds: u32,
    pub last_request_id: String,
    pub reported_at: String,
}

impl PumpStatePayload {
    pub fn from_state(state: &PumpState, now_iso: String) -> Self {
        Self {
            running: state.running,
            since: state.running.then(|| state.start_iso.clone()),
            last_run_seconds: state.run_seconds,
            last_request_id: state.last_request_id.clone(),
            reported_at: now_iso,
        }
    }
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

pub fn encode<T: Serialize>(payload: &T) -> Result<Vec<u8>, WireError> {
    serde_json::to_vec(payload).map_err(|_| WireError::EncodeFailed)
}

// Each field is read on its own: a missing, null or wrongly typed field
// falls back to its default instead of rejecting the whole message.

fn str_field<'a>(doc: &'a Value, key: &str) -> Option<&'a str> {
    doc.get(key).and_then(Value::as_str)
}

fn i32_field(doc: &Value, key: &str) -> Option<i32> {
    doc.get(key)
        .and_then(Value::as_i64)
        .and_then(|v| i32::try_from(v).ok())
}

fn parse(payload: &[u8]) -> Result<Value, WireError> {
    serde_json::from_slice(payload).map_err(|_| WireError::Malformed)
}

/// Decode a pump command.  Only unparseable JSON is rejected.
pub fn decode_command(payload: &[u8]) -> Result<PumpCommand, WireError> {
    let doc = parse(payload)?;
    Ok(PumpCommand {
        action: str_field(&doc, "action").unwrap_or(DEFAULT_ACTION).to_owned(),
        run_seconds: i32_field(&doc, "runSeconds").unwrap_or(0),
        request_id: str_field(&doc, "requestId").unwrap_or_default().to_owned(),
    })
}

/// Extract the level percentage; a report without a usable one decodes
/// as unknown.
pub fn decode_water_level(payload: &[u8]) -> Result<i32, WireError> {
    let doc = parse(payload)?;
    Ok(i32_field(&doc, "levelPercent").unwrap_or(LEVEL_UNKNOWN))
}

/// Map an inbound MQTT message to a pump node event.
///
/// Returns `Ok(None)` for topics the pump node does not consume.
pub fn decode_pump_message(
    topics: &Topics,
    topic: &str,
    payload: &[u8],
) -> Result<Option<PumpNodeEvent>, WireError> {
    if topic == topics.pump_cmd {
        decode_command(payload).map(|cmd| Some(PumpNodeEvent::Command(cmd)))
    } else if topic == topics.water_level {
        decode_water_level(payload).map(|p| Some(PumpNodeEvent::WaterLevel(p)))
    } else {
        Ok(None)
    }
}
