//! Fuzz target: inbound broker messages into the pump node.
//!
//! Feeds arbitrary payloads on both consumed topics through
//! `PumpNode::handle_message`, then ticks the node.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - The relay always mirrors the controller's running flag
//! - A start is never applied while the water level is unknown or empty
//!
//! cargo fuzz run fuzz_pump_message

#![no_main]

use libfuzzer_sys::fuzz_target;
use wateringrig::app::events::AppEvent;
use wateringrig::app::ports::{EventSink, MqttPort, RelayPort, WallClock};
use wateringrig::app::service::PumpNode;
use wateringrig::app::commands::PumpNodeEvent;
use wateringrig::config::PumpNodeConfig;
use wateringrig::error::{CommsError, HardwareError};

struct Clock;
impl WallClock for Clock {
    fn iso_utc_now(&self) -> String {
        String::from("1970-01-01T00:00:00Z")
    }
}

#[derive(Default)]
struct Relay(bool);
impl RelayPort for Relay {
    fn set_relay(&mut self, on: bool) -> Result<(), HardwareError> {
        self.0 = on;
        Ok(())
    }
}

struct Broker;
impl MqttPort for Broker {
    fn publish(&mut self, _: &str, _: &[u8], _: bool) -> Result<(), CommsError> {
        Ok(())
    }
    fn subscribe(&mut self, _: &str) -> Result<(), CommsError> {
        Ok(())
    }
}

struct Discard;
impl EventSink for Discard {
    fn emit(&mut self, _: &AppEvent) {}
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // First byte selects the topic and the split point.
    let (selector, rest) = data.split_at(1);
    let mid = rest.len() * usize::from(selector[0] & 0x7f) / 128;
    let (first, second) = rest.split_at(mid);

    let mut node = PumpNode::new(&PumpNodeConfig::default(), Clock);
    let (mut relay, mut mqtt, mut sink) = (Relay::default(), Broker, Discard);
    node.start(&mut relay, &mut sink);
    node.handle(PumpNodeEvent::Connected, 0, &mut relay, &mut mqtt, &mut sink);

    let topics = node.topics().clone();
    let (a, b) = if selector[0] & 0x80 == 0 {
        (&topics.water_level, &topics.pump_cmd)
    } else {
        (&topics.pump_cmd, &topics.water_level)
    };

    node.handle_message(a, first, 10, &mut relay, &mut mqtt, &mut sink);
    let level_ok = node.controller().is_water_level_safe(20);
    node.handle_message(b, second, 20, &mut relay, &mut mqtt, &mut sink);

    assert_eq!(relay.0, node.state().running);
    if !level_ok && b == &topics.pump_cmd {
        assert!(!relay.0, "pump started without a safe water level");
    }

    node.handle(PumpNodeEvent::Tick, 30, &mut relay, &mut mqtt, &mut sink);
    assert_eq!(relay.0, node.state().running);
});
