//! Application core — node orchestration around the decision logic, zero I/O.
//!
//! The pure decision components live in [`crate::level`] and
//! [`crate::pump`].  This module wires them to the outside world through
//! **port traits** defined in [`ports`], keeping every control loop step
//! testable without real peripherals or a broker.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
