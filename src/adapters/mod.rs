//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                  | Connects to             |
//! |------------|-----------------------------|-------------------------|
//! | `hardware` | LevelSensorPort, RelayPort  | ESP32 GPIO              |
//! | `log_sink` | EventSink                   | Serial log output       |
//! | `mqtt`     | MqttPort                    | ESP-IDF MQTT client     |
//! | `time`     | MonotonicClock, WallClock   | ESP32 timer, SNTP clock |
//! | `wifi`     | —                           | ESP-IDF WiFi STA        |

pub mod hardware;
pub mod log_sink;
pub mod mqtt;
pub mod time;
pub mod wifi;
