//! Pump command, safety and run-timeout state machine.
//!
//! [`PumpController`] is the single authority for pump run/stop
//! transitions.  Three independent event sources feed it:
//!
//! ```text
//!   remote command ──▶ evaluate_command() ─┐
//!   periodic tick  ──▶ on_tick()          ─┼──▶ PumpDecision ──▶ apply_decision()
//!   link lost      ──▶ on_mqtt_disconnected()┘         │
//!                                                      ▼
//!                                               control loop drives relay
//! ```
//!
//! Every decision function is pure.  [`PumpController::apply_decision`] is
//! the only mutator, and the control loop calls it in the same step that
//! drives the relay, so recorded state and actuation cannot drift apart.
//!
//! Timeouts are enforced purely by polling `on_tick`; the loop period
//! bounds how far a run can overshoot its duration.

use crate::app::ports::WallClock;
use crate::safety::{InterlockStatus, WaterLevelInterlock};

/// Action string that always stops the pump.  Every other action value,
/// recognised or not, is treated as a start request.
pub const ACTION_STOP: &str = "stop";

/// An intended pump transition that has not been applied yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpDecision {
    /// Nothing to do, or a start request refused by the interlock.
    None,
    Start { run_seconds: u32, request_id: String },
    Stop { request_id: String },
}

impl PumpDecision {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Read-only view of the controller for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpState {
    pub running: bool,
    /// Monotonic ms at which the current (or last) run started.
    pub start_ms: u32,
    /// Requested duration of the current (or last) run.
    pub run_seconds: u32,
    pub last_request_id: String,
    /// Wall-clock start of the current (or last) run.
    pub start_iso: String,
    /// `-1` until the first water level observation.
    pub last_water_level_percent: i32,
    pub last_water_level_seen_ms: u32,
}

/// Owns pump run state and the water level interlock.
pub struct PumpController {
    running: bool,
    start_ms: u32,
    run_seconds: u32,
    last_request_id: String,
    start_iso: String,
    interlock: WaterLevelInterlock,
}

impl PumpController {
    /// Pump stopped, water level unknown, no request seen.
    pub fn new(water_level_stale_ms: u32) -> Self {
        Self {
            running: false,
            start_ms: 0,
            run_seconds: 0,
            last_request_id: String::new(),
            start_iso: String::new(),
            interlock: WaterLevelInterlock::new(water_level_stale_ms),
        }
    }

    // ── Interlock ─────────────────────────────────────────────

    pub fn update_water_level(&mut self, percent: i32, now_ms: u32) {
        self.interlock.observe(percent, now_ms);
    }

    pub fn is_water_level_known(&self) -> bool {
        self.interlock.is_known()
    }

    pub fn is_water_level_stale(&self, now_ms: u32) -> bool {
        self.interlock.is_stale(now_ms)
    }

    pub fn is_water_level_safe(&self, now_ms: u32) -> bool {
        self.interlock.is_safe(now_ms)
    }

    pub fn interlock_status(&self, now_ms: u32) -> InterlockStatus {
        self.interlock.status(now_ms)
    }

    // ── Decisions (pure) ──────────────────────────────────────

    /// Evaluate a remote command against the interlock.
    ///
    /// `"stop"` always yields `Stop`, whatever the running state or water
    /// level.  Anything else is a start request and yields `None` unless the
    /// level is safe and `run_seconds` is positive.
    pub fn evaluate_command(
        &self,
        action: &str,
        run_seconds: i32,
        request_id: &str,
        now_ms: u32,
    ) -> PumpDecision {
        if action == ACTION_STOP {
            return PumpDecision::Stop {
                request_id: request_id.to_owned(),
            };
        }

        if !self.is_water_level_safe(now_ms) || run_seconds <= 0 {
            return PumpDecision::None;
        }

        PumpDecision::Start {
            run_seconds: run_seconds as u32,
            request_id: request_id.to_owned(),
        }
    }

    /// Losing the control channel must not leave the pump unsupervised.
    pub fn on_mqtt_disconnected(&self) -> PumpDecision {
        if self.running {
            PumpDecision::Stop {
                request_id: self.last_request_id.clone(),
            }
        } else {
            PumpDecision::None
        }
    }

    /// Stop once the requested duration has elapsed (whole seconds, truncated).
    pub fn on_tick(&self, now_ms: u32) -> PumpDecision {
        if !self.running || self.run_seconds == 0 {
            return PumpDecision::None;
        }

        let elapsed_secs = now_ms.wrapping_sub(self.start_ms) / 1000;
        if elapsed_secs >= self.run_seconds {
            PumpDecision::Stop {
                request_id: self.last_request_id.clone(),
            }
        } else {
            PumpDecision::None
        }
    }

    // ── Mutation ──────────────────────────────────────────────

    /// Apply a decision.  The wall clock is read only for `Start`.
    ///
    /// `Stop` clears `running` and keeps the last request id and duration
    /// for reporting.
    pub fn apply_decision(&mut self, decision: &PumpDecision, now_ms: u32, clock: &impl WallClock) {
        match decision {
            PumpDecision::Start {
                run_seconds,
                request_id,
            } => {
                self.running = true;
                self.start_ms = now_ms;
                self.run_seconds = *run_seconds;
                self.last_request_id.clone_from(request_id);
                self.start_iso = clock.iso_utc_now();
            }
            PumpDecision::Stop { .. } => {
                self.running = false;
            }
            PumpDecision::None => {}
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn state(&self) -> PumpState {
        PumpState {
            running: self.running,
            start_ms: self.start_ms,
            run_seconds: self.run_seconds,
            last_request_id: self.last_request_id.clone(),
            start_iso: self.start_iso.clone(),
            last_water_level_percent: self.interlock.last_percent(),
            last_water_level_seen_ms: self.interlock.last_seen_ms(),
        }
    }
}
