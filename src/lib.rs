//! WateringRig firmware library.
//!
//! Two ESP32 nodes cooperate over MQTT: a level node reports the
//! reservoir fill level from four float switches, and a pump node drives
//! a relay on remote command, refusing to run dry.
//!
//! The decision core ([`level`], [`pump`], [`safety`]) is pure logic with
//! injected time.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` inside [`adapters`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod level;
pub mod pump;
pub mod safety;
pub mod wire;
