//! Hardware adapter — bridges GPIO pins to the domain port traits.
//!
//! Generic over the `embedded-hal` 1.0 digital traits so the same code
//! drives `esp_idf_hal::gpio::PinDriver` on the device and plain mock pins
//! in host tests.  This is the only module that touches actual hardware.

use embedded_hal::digital::{InputPin, OutputPin};
use log::info;

use crate::app::ports::{LevelSensorPort, RelayPort};
use crate::error::HardwareError;
use crate::level::{SENSOR_COUNT, SensorVector};

// ── Level switch bank ─────────────────────────────────────────

/// Four float switches, lowest first.  A high input means the switch is
/// submerged.
pub struct LevelSensorBank<P: InputPin> {
    pins: [P; SENSOR_COUNT],
}

impl<P: InputPin> LevelSensorBank<P> {
    pub fn new(pins: [P; SENSOR_COUNT]) -> Self {
        Self { pins }
    }
}

impl<P: InputPin> LevelSensorPort for LevelSensorBank<P> {
    fn read_levels(&mut self) -> Result<SensorVector, HardwareError> {
        let mut sensors = [false; SENSOR_COUNT];
        for (slot, pin) in sensors.iter_mut().zip(self.pins.iter_mut()) {
            *slot = pin.is_high().map_err(|_| HardwareError::GpioReadFailed)?;
        }
        Ok(sensors)
    }
}

// ── Pump relay ────────────────────────────────────────────────

/// Single-channel relay on one GPIO, with configurable polarity.
pub struct Relay<P: OutputPin> {
    pin: P,
    active_high: bool,
    on: bool,
}

impl<P: OutputPin> Relay<P> {
    /// Take ownership of the pin and drive it to the released level.
    pub fn new(pin: P, active_high: bool) -> Result<Self, HardwareError> {
        let mut relay = Self {
            pin,
            active_high,
            on: false,
        };
        relay.set_relay(false)?;
        info!("Relay: ready (active_{})", if active_high { "high" } else { "low" });
        Ok(relay)
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}

impl<P: OutputPin> RelayPort for Relay<P> {
    fn set_relay(&mut self, on: bool) -> Result<(), HardwareError> {
        let high = on == self.active_high;
        let result = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        result.map_err(|_| HardwareError::GpioWriteFailed)?;
        self.on = on;
        Ok(())
    }
}
