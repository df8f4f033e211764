//! Level node firmware — main entry point.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  LevelSensorBank   MqttAdapter   SystemClock         │
//! │  (LevelSensorPort) (MqttPort)    (Monotonic+Wall)    │
//! │  ────────────── Port Trait Boundary ──────────────   │
//! │              LevelNode (LevelAggregator)             │
//! └─────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use anyhow::Result;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio::{AnyIOPin, PinDriver};
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sntp::EspSntp;
use log::{info, warn};

use wateringrig::adapters::hardware::LevelSensorBank;
use wateringrig::adapters::log_sink::LogEventSink;
use wateringrig::adapters::mqtt::{Inbound, LinkTracker, MqttAdapter, MqttInbox};
use wateringrig::adapters::time::SystemClock;
use wateringrig::adapters::wifi::WifiLink;
use wateringrig::app::commands::LevelNodeEvent;
use wateringrig::app::ports::{LevelSensorPort, MonotonicClock};
use wateringrig::app::service::LevelNode;
use wateringrig::config::LevelNodeConfig;

static MQTT_INBOX: MqttInbox = MqttInbox::new();

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    info!("WateringRig level node v{}", env!("CARGO_PKG_VERSION"));

    let config = LevelNodeConfig::default();
    config.validate()?;

    // ── 2. Peripherals and network ────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let mut wifi = WifiLink::start(peripherals.modem, sysloop, nvs, &config.network)?;
    let _sntp = EspSntp::new_default()?;
    let mut mqtt = MqttAdapter::connect(&config.network, &MQTT_INBOX)?;

    // ── 3. Sensors ────────────────────────────────────────────
    let mut pins = Vec::with_capacity(config.sensor_gpios.len());
    for gpio in config.sensor_gpios {
        // SAFETY: these GPIOs are not claimed anywhere else in this image.
        let pin = unsafe { AnyIOPin::new(gpio) };
        pins.push(PinDriver::input(pin)?);
    }
    let pins = pins
        .try_into()
        .map_err(|_| anyhow::anyhow!("sensor pin count mismatch"))?;
    let mut sensors = LevelSensorBank::new(pins);

    // ── 4. Node service ───────────────────────────────────────
    let clock = SystemClock::new();
    let mut sink = LogEventSink::new();
    let mut node = LevelNode::new(&config, SystemClock::new());
    let mut link = LinkTracker::new();
    node.start(&mut sink);

    // ── 5. Control loop ───────────────────────────────────────
    loop {
        let now_ms = clock.now_ms();
        wifi.poll(now_ms);

        // The level node subscribes to nothing; only link changes matter.
        MQTT_INBOX.drain(&mut link, |inbound| {
            if let Inbound::Link(event) = inbound {
                node.handle(event.into(), now_ms, &mut mqtt, &mut sink);
            }
        });

        match sensors.read_levels() {
            Ok(levels) => node.handle(LevelNodeEvent::Sample(levels), now_ms, &mut mqtt, &mut sink),
            Err(e) => warn!("Sensor read failed: {}", e),
        }

        std::thread::sleep(Duration::from_millis(u64::from(config.poll_interval_ms)));
    }
}
