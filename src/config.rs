//! Node configuration parameters
//!
//! All tunable parameters for the level sensor node and the pump node.
//! Defaults can be overridden at build time through environment variables
//! (`WIFI_SSID`, `WIFI_PASS`, `MQTT_HOST`, `MQTT_PREFIX`, ...).

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Placeholder left in unconfigured builds.
const PLACEHOLDER: &str = "CHANGE_ME";

/// Wi-Fi and broker settings shared by both nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    // --- Wi-Fi ---
    pub wifi_ssid: String,
    pub wifi_password: String,
    /// Give up on a station connect attempt after this long (milliseconds)
    pub wifi_connect_timeout_ms: u32,

    // --- MQTT ---
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_client_id: String,
    /// Topic base; topics are `<prefix>/WateringController/...`
    pub topic_prefix: String,
    /// Minimum spacing between broker connect attempts (milliseconds)
    pub mqtt_retry_ms: u32,
}

impl NetworkConfig {
    fn with_client_id(client_id: &str) -> Self {
        Self {
            wifi_ssid: option_env!("WIFI_SSID").unwrap_or(PLACEHOLDER).into(),
            wifi_password: option_env!("WIFI_PASS").unwrap_or(PLACEHOLDER).into(),
            wifi_connect_timeout_ms: 20_000,

            mqtt_host: option_env!("MQTT_HOST").unwrap_or(PLACEHOLDER).into(),
            mqtt_port: option_env!("MQTT_PORT")
                .unwrap_or("-")
                .parse()
                .unwrap_or(1883),
            mqtt_user: option_env!("MQTT_USER").map(Into::into),
            mqtt_password: option_env!("MQTT_PASS").map(Into::into),
            mqtt_client_id: client_id.into(),
            topic_prefix: option_env!("MQTT_PREFIX").unwrap_or("home/veranda").into(),
            mqtt_retry_ms: 5_000,
        }
    }

    /// Broker URL in the form the ESP-IDF MQTT client expects.
    pub fn mqtt_url(&self) -> String {
        format!("mqtt://{}:{}", self.mqtt_host, self.mqtt_port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wifi_ssid.is_empty() || self.wifi_ssid == PLACEHOLDER {
            return Err(ConfigError("wifi_ssid is not configured"));
        }
        if self.mqtt_host.is_empty() || self.mqtt_host == PLACEHOLDER {
            return Err(ConfigError("mqtt_host is not configured"));
        }
        if self.mqtt_port == 0 {
            return Err(ConfigError("mqtt_port must be non-zero"));
        }
        if self.mqtt_client_id.is_empty() {
            return Err(ConfigError("mqtt_client_id must not be empty"));
        }
        if self.wifi_connect_timeout_ms == 0 || self.mqtt_retry_ms == 0 {
            return Err(ConfigError("network timeouts must be non-zero"));
        }
        Ok(())
    }
}

/// Level sensor node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelNodeConfig {
    pub network: NetworkConfig,
    /// GPIOs of the four level switches, lowest first
    pub sensor_gpios: [i32; 4],
    /// Heartbeat publish interval when the level is unchanged (milliseconds)
    pub publish_interval_ms: u32,
    /// Sensor poll period (milliseconds)
    pub poll_interval_ms: u32,
}

impl Default for LevelNodeConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::with_client_id("waterlevel-esp32"),
            sensor_gpios: [4, 5, 6, 7],
            publish_interval_ms: 5 * 60 * 1000, // 5 min
            poll_interval_ms: 50,
        }
    }
}

impl LevelNodeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.network.validate()?;
        if self.publish_interval_ms == 0 {
            return Err(ConfigError("publish_interval_ms must be non-zero"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError("poll_interval_ms must be non-zero"));
        }
        Ok(())
    }
}

/// Pump node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpNodeConfig {
    pub network: NetworkConfig,

    // --- Relay ---
    pub relay_gpio: i32,
    /// `true` if driving the GPIO high energises the relay
    pub relay_active_high: bool,

    // --- Safety ---
    /// Water level observations older than this block pump starts (milliseconds)
    pub water_level_stale_ms: u32,

    // --- Timing ---
    /// Re-publish pump state at least this often (milliseconds)
    pub state_publish_interval_ms: u32,
    /// Control loop period while connected (milliseconds)
    pub loop_interval_ms: u32,
    /// Control loop period while the broker link is down (milliseconds)
    pub disconnected_poll_ms: u32,
}

impl Default for PumpNodeConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::with_client_id("pump-esp32"),

            relay_gpio: 21,
            relay_active_high: true,

            water_level_stale_ms: 10 * 60 * 1000, // 10 min

            state_publish_interval_ms: 60 * 1000, // 1/min
            loop_interval_ms: 50,
            disconnected_poll_ms: 200,
        }
    }
}

impl PumpNodeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.network.validate()?;
        if self.water_level_stale_ms == 0 {
            return Err(ConfigError("water_level_stale_ms must be non-zero"));
        }
        if self.state_publish_interval_ms == 0 {
            return Err(ConfigError("state_publish_interval_ms must be non-zero"));
        }
        if self.loop_interval_ms == 0 || self.disconnected_poll_ms == 0 {
            return Err(ConfigError("loop intervals must be non-zero"));
        }
        Ok(())
    }
}
