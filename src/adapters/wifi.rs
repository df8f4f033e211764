//! WiFi station-mode adapter.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver via `esp_idf_svc::wifi`.
//! - **all other targets**: only the credential checks and the attempt
//!   tracker, which are plain logic.
//!
//! ## Reconnection policy
//!
//! The control loop calls `poll()` every iteration.  While the station is
//! down a connect attempt is started; an attempt that has not come up
//! within `wifi_connect_timeout_ms` is abandoned and restarted.

use core::fmt;

use crate::error::CommsError;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    InvalidSsid,
    InvalidPassword,
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
        }
    }
}

impl From<CredentialError> for CommsError {
    fn from(_: CredentialError) -> Self {
        Self::WifiConnectFailed
    }
}

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

pub fn validate_credentials(ssid: &str, password: &str) -> Result<(), CredentialError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(CredentialError::InvalidSsid);
    }
    if !password.is_empty() && !(8..=64).contains(&password.len()) {
        return Err(CredentialError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Attempt tracking
// ───────────────────────────────────────────────────────────────

/// What the link should do on this poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// Up, or an attempt is in flight.
    Wait,
    /// Start a new connect attempt.
    Connect,
    /// The in-flight attempt timed out; tear it down and start over.
    Restart,
}

/// Tracks the in-flight connect attempt.
#[derive(Debug, Clone)]
pub struct ConnectAttempt {
    started_ms: Option<u32>,
    timeout_ms: u32,
}

impl ConnectAttempt {
    pub fn new(timeout_ms: u32) -> Self {
        Self {
            started_ms: None,
            timeout_ms,
        }
    }

    pub fn poll(&mut self, connected: bool, now_ms: u32) -> LinkAction {
        if connected {
            self.started_ms = None;
            return LinkAction::Wait;
        }
        match self.started_ms {
            None => {
                self.started_ms = Some(now_ms);
                LinkAction::Connect
            }
            Some(start) if now_ms.wrapping_sub(start) > self.timeout_ms => {
                self.started_ms = Some(now_ms);
                LinkAction::Restart
            }
            Some(_) => LinkAction::Wait,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF station
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::WifiLink;

#[cfg(target_os = "espidf")]
mod esp {
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::modem::Modem;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};
    use log::{info, warn};

    use super::{ConnectAttempt, LinkAction, validate_credentials};
    use crate::config::NetworkConfig;
    use crate::error::CommsError;

    pub struct WifiLink {
        wifi: EspWifi<'static>,
        attempt: ConnectAttempt,
    }

    impl WifiLink {
        /// Configure and start the station.  Connecting happens in `poll()`.
        pub fn start(
            modem: Modem,
            sysloop: EspSystemEventLoop,
            nvs: EspDefaultNvsPartition,
            config: &NetworkConfig,
        ) -> Result<Self, CommsError> {
            validate_credentials(&config.wifi_ssid, &config.wifi_password)?;

            let mut wifi = EspWifi::new(modem, sysloop, Some(nvs))
                .map_err(|_| CommsError::WifiConnectFailed)?;

            let auth_method = if config.wifi_password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            };
            let client = ClientConfiguration {
                ssid: config
                    .wifi_ssid
                    .as_str()
                    .try_into()
                    .map_err(|_| CommsError::WifiConnectFailed)?,
                password: config
                    .wifi_password
                    .as_str()
                    .try_into()
                    .map_err(|_| CommsError::WifiConnectFailed)?,
                auth_method,
                ..Default::default()
            };
            wifi.set_configuration(&Configuration::Client(client))
                .map_err(|_| CommsError::WifiConnectFailed)?;
            wifi.start().map_err(|_| CommsError::WifiConnectFailed)?;
            info!("WiFi: station started for '{}'", config.wifi_ssid);

            Ok(Self {
                wifi,
                attempt: ConnectAttempt::new(config.wifi_connect_timeout_ms),
            })
        }

        pub fn is_connected(&self) -> bool {
            self.wifi.is_up().unwrap_or(false)
        }

        /// Drive the reconnection policy.  Returns whether the link is up.
        pub fn poll(&mut self, now_ms: u32) -> bool {
            let connected = self.is_connected();
            match self.attempt.poll(connected, now_ms) {
                LinkAction::Wait => {}
                LinkAction::Connect => {
                    info!("WiFi: connecting");
                    if let Err(e) = self.wifi.connect() {
                        warn!("WiFi: connect failed: {:?}", e);
                    }
                }
                LinkAction::Restart => {
                    warn!("WiFi: connect attempt timed out, retrying");
                    if let Err(e) = self.wifi.disconnect() {
                        warn!("WiFi: disconnect failed: {:?}", e);
                    }
                    if let Err(e) = self.wifi.connect() {
                        warn!("WiFi: connect failed: {:?}", e);
                    }
                }
            }
            connected
        }
    }
}
