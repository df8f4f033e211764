//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(kind) => {
                info!("START | node={:?}", kind);
            }
            AppEvent::Connected => {
                info!("MQTT  | connected");
            }
            AppEvent::Disconnected => {
                warn!("MQTT  | disconnected");
            }
            AppEvent::PumpStarted {
                run_seconds,
                request_id,
            } => {
                info!("PUMP  | on run_seconds={} request_id={}", run_seconds, request_id);
            }
            AppEvent::PumpStopped { request_id, cause } => {
                info!("PUMP  | off cause={:?} request_id={}", cause, request_id);
            }
            AppEvent::CommandRefused { request_id, reason } => {
                warn!("PUMP  | refused reason={:?} request_id={}", reason, request_id);
            }
            AppEvent::WaterLevelObserved(percent) => {
                info!("LEVEL | observed={}%", percent);
            }
            AppEvent::LevelPublished(snapshot) => {
                let s = snapshot.sensors;
                info!(
                    "LEVEL | published={}% sensors={}{}{}{}",
                    snapshot.level_percent,
                    u8::from(s[0]),
                    u8::from(s[1]),
                    u8::from(s[2]),
                    u8::from(s[3]),
                );
            }
            AppEvent::PublishFailed(topic) => {
                warn!("MQTT  | publish failed topic={}", topic);
            }
            AppEvent::PayloadRejected(topic) => {
                warn!("MQTT  | payload rejected topic={}", topic);
            }
        }
    }
}
