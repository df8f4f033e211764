//! Pump node firmware — main entry point.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Relay          MqttAdapter   SystemClock            │
//! │  (RelayPort)    (MqttPort)    (Monotonic+Wall)       │
//! │  ────────────── Port Trait Boundary ──────────────   │
//! │              PumpNode (PumpController)               │
//! └─────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use anyhow::Result;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio::{AnyOutputPin, PinDriver};
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sntp::EspSntp;
use log::info;

use wateringrig::adapters::hardware::Relay;
use wateringrig::adapters::log_sink::LogEventSink;
use wateringrig::adapters::mqtt::{Inbound, LinkTracker, MqttAdapter, MqttInbox};
use wateringrig::adapters::time::SystemClock;
use wateringrig::adapters::wifi::WifiLink;
use wateringrig::app::commands::PumpNodeEvent;
use wateringrig::app::ports::MonotonicClock;
use wateringrig::app::service::PumpNode;
use wateringrig::config::PumpNodeConfig;

static MQTT_INBOX: MqttInbox = MqttInbox::new();

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    info!("WateringRig pump node v{}", env!("CARGO_PKG_VERSION"));

    let config = PumpNodeConfig::default();
    config.validate()?;

    // ── 2. Relay first, so the pump is off before anything else ──
    // SAFETY: the relay GPIO is not claimed anywhere else in this image.
    let relay_pin = unsafe { AnyOutputPin::new(config.relay_gpio) };
    let mut relay = Relay::new(PinDriver::output(relay_pin)?, config.relay_active_high)?;

    // ── 3. Peripherals and network ────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let mut wifi = WifiLink::start(peripherals.modem, sysloop, nvs, &config.network)?;
    let _sntp = EspSntp::new_default()?;
    let mut mqtt = MqttAdapter::connect(&config.network, &MQTT_INBOX)?;

    // ── 4. Node service ───────────────────────────────────────
    let clock = SystemClock::new();
    let mut sink = LogEventSink::new();
    let mut node = PumpNode::new(&config, SystemClock::new());
    let mut link = LinkTracker::new();
    node.start(&mut relay, &mut sink);

    // ── 5. Control loop ───────────────────────────────────────
    loop {
        let now_ms = clock.now_ms();
        wifi.poll(now_ms);

        MQTT_INBOX.drain(&mut link, |inbound| match inbound {
            Inbound::Link(event) => {
                node.handle(event.into(), now_ms, &mut relay, &mut mqtt, &mut sink);
            }
            Inbound::Message { topic, payload } => {
                node.handle_message(topic, payload, now_ms, &mut relay, &mut mqtt, &mut sink);
            }
        });

        node.handle(PumpNodeEvent::Tick, now_ms, &mut relay, &mut mqtt, &mut sink);

        let delay_ms = if node.is_connected() {
            config.loop_interval_ms
        } else {
            config.disconnected_poll_ms
        };
        std::thread::sleep(Duration::from_millis(u64::from(delay_ms)));
    }
}
