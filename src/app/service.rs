//! Node services — the hexagonal core of each firmware image.
//!
//! [`LevelNode`] owns the [`LevelAggregator`]; [`PumpNode`] owns the
//! [`PumpController`].  Each exposes a single `handle()` entrypoint that
//! takes one inbound event plus the ports it may touch, so the whole
//! control loop is testable with mock adapters.
//!
//! ```text
//!  LevelSensorPort ──▶ LevelNodeEvent ──▶ ┌───────────┐ ──▶ MqttPort
//!                                         │ LevelNode │ ──▶ EventSink
//!                                         └───────────┘
//!
//!  MqttInbox ──▶ PumpNodeEvent ──▶ ┌──────────┐ ──▶ RelayPort
//!        Tick ─────────────────▶   │ PumpNode │ ──▶ MqttPort
//!                                  └──────────┘ ──▶ EventSink
//! ```

use log::{debug, error, info, warn};

use crate::config::{LevelNodeConfig, PumpNodeConfig};
use crate::error::Error;
use crate::level::{LevelAggregator, LevelSnapshot, SensorVector};
use crate::pump::{ACTION_STOP, PumpController, PumpDecision, PumpState};
use crate::wire::{self, PumpStatePayload, Topics, WaterLevelPayload};

use super::commands::{LevelNodeEvent, PumpCommand, PumpNodeEvent};
use super::events::{AppEvent, NodeKind, RefusalReason, StopCause};
use super::ports::{EventSink, MqttPort, RelayPort, WallClock};

// Short topic labels for events and logs.
const LABEL_LEVEL: &str = "waterlevel/state";
const LABEL_PUMP_STATE: &str = "pump/state";
const LABEL_PUMP_CMD: &str = "pump/cmd";
const LABEL_SUBSCRIBE: &str = "subscribe";

// ───────────────────────────────────────────────────────────────
// LevelNode
// ───────────────────────────────────────────────────────────────

/// Level sensor node: sample → change/heartbeat gate → publish.
pub struct LevelNode<W: WallClock> {
    aggregator: LevelAggregator,
    topics: Topics,
    clock: W,
    connected: bool,
}

impl<W: WallClock> LevelNode<W> {
    pub fn new(config: &LevelNodeConfig, clock: W) -> Self {
        Self {
            aggregator: LevelAggregator::new(config.publish_interval_ms),
            topics: Topics::new(&config.network.topic_prefix),
            clock,
            connected: false,
        }
    }

    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started(NodeKind::Level));
        info!(
            "LevelNode started (heartbeat every {} ms)",
            self.aggregator.publish_interval_ms()
        );
    }

    /// Process one inbound event.
    pub fn handle(
        &mut self,
        event: LevelNodeEvent,
        now_ms: u32,
        mqtt: &mut impl MqttPort,
        sink: &mut impl EventSink,
    ) {
        match event {
            LevelNodeEvent::Connected => {
                self.connected = true;
                sink.emit(&AppEvent::Connected);
            }
            LevelNodeEvent::Disconnected => {
                self.connected = false;
                sink.emit(&AppEvent::Disconnected);
            }
            LevelNodeEvent::Sample(sensors) => self.on_sample(sensors, now_ms, mqtt, sink),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn aggregator(&self) -> &LevelAggregator {
        &self.aggregator
    }

    // ── Internal ──────────────────────────────────────────────

    fn on_sample(
        &mut self,
        sensors: SensorVector,
        now_ms: u32,
        mqtt: &mut impl MqttPort,
        sink: &mut impl EventSink,
    ) {
        let changed = self.aggregator.has_changed(sensors);
        if !self.aggregator.should_publish(changed, now_ms) {
            return;
        }
        // Offline: leave the gate open so the reading goes out after reconnect.
        if !self.connected {
            return;
        }

        let snapshot = self.aggregator.build_snapshot(sensors);
        match self.publish(&snapshot, mqtt) {
            Ok(()) => {
                self.aggregator.mark_published(sensors, now_ms);
                debug!(
                    "Level published: {}% (changed={})",
                    snapshot.level_percent, changed
                );
                sink.emit(&AppEvent::LevelPublished(snapshot));
            }
            Err(e) => {
                warn!("Level publish failed: {}", e);
                sink.emit(&AppEvent::PublishFailed(LABEL_LEVEL));
            }
        }
    }

    fn publish(&self, snapshot: &LevelSnapshot, mqtt: &mut impl MqttPort) -> Result<(), Error> {
        let payload = WaterLevelPayload::from_snapshot(snapshot, self.clock.iso_utc_now());
        let bytes = wire::encode(&payload)?;
        mqtt.publish(&self.topics.water_level, &bytes, true)?;
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// PumpNode
// ───────────────────────────────────────────────────────────────

/// Pump node: commands, ticks and link loss → one controller → relay.
pub struct PumpNode<W: WallClock> {
    controller: PumpController,
    topics: Topics,
    clock: W,
    state_publish_interval_ms: u32,
    last_state_publish_ms: u32,
    connected: bool,
    subscribed: bool,
    /// A relay release failed; retried every tick while stopped.
    relay_release_pending: bool,
}

impl<W: WallClock> PumpNode<W> {
    pub fn new(config: &PumpNodeConfig, clock: W) -> Self {
        Self {
            controller: PumpController::new(config.water_level_stale_ms),
            topics: Topics::new(&config.network.topic_prefix),
            clock,
            state_publish_interval_ms: config.state_publish_interval_ms,
            last_state_publish_ms: 0,
            connected: false,
            subscribed: false,
            relay_release_pending: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Drive the relay to its safe (off) state and announce start-up.
    pub fn start(&mut self, relay: &mut impl RelayPort, sink: &mut impl EventSink) {
        self.release_relay(relay);
        sink.emit(&AppEvent::Started(NodeKind::Pump));
        info!("PumpNode started (relay released)");
    }

    // ── Event dispatch ────────────────────────────────────────

    /// Process one inbound event.
    pub fn handle(
        &mut self,
        event: PumpNodeEvent,
        now_ms: u32,
        relay: &mut impl RelayPort,
        mqtt: &mut impl MqttPort,
        sink: &mut impl EventSink,
    ) {
        match event {
            PumpNodeEvent::Connected => {
                self.connected = true;
                self.subscribed = false;
                sink.emit(&AppEvent::Connected);
                self.ensure_subscribed(now_ms, mqtt, sink);
            }
            PumpNodeEvent::Disconnected => {
                self.connected = false;
                self.subscribed = false;
                sink.emit(&AppEvent::Disconnected);
                let decision = self.controller.on_mqtt_disconnected();
                self.apply(decision, StopCause::ConnectionLost, now_ms, relay, mqtt, sink);
            }
            PumpNodeEvent::Command(cmd) => self.on_command(&cmd, now_ms, relay, mqtt, sink),
            PumpNodeEvent::WaterLevel(percent) => {
                self.controller.update_water_level(percent, now_ms);
                sink.emit(&AppEvent::WaterLevelObserved(percent));
            }
            PumpNodeEvent::Tick => self.on_tick(now_ms, relay, mqtt, sink),
        }
    }

    /// Decode a raw broker message and dispatch it.  Unknown topics are
    /// ignored; malformed payloads are reported and dropped.
    pub fn handle_message(
        &mut self,
        topic: &str,
        payload: &[u8],
        now_ms: u32,
        relay: &mut impl RelayPort,
        mqtt: &mut impl MqttPort,
        sink: &mut impl EventSink,
    ) {
        match wire::decode_pump_message(&self.topics, topic, payload) {
            Ok(Some(event)) => self.handle(event, now_ms, relay, mqtt, sink),
            Ok(None) => debug!("Ignoring message on '{}'", topic),
            Err(e) => {
                let label = if topic == self.topics.pump_cmd {
                    LABEL_PUMP_CMD
                } else {
                    LABEL_LEVEL
                };
                warn!("Dropping {} payload: {}", label, e);
                sink.emit(&AppEvent::PayloadRejected(label));
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> PumpState {
        self.controller.state()
    }

    pub fn controller(&self) -> &PumpController {
        &self.controller
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    // ── Internal ──────────────────────────────────────────────

    fn on_command(
        &mut self,
        cmd: &PumpCommand,
        now_ms: u32,
        relay: &mut impl RelayPort,
        mqtt: &mut impl MqttPort,
        sink: &mut impl EventSink,
    ) {
        let decision =
            self.controller
                .evaluate_command(&cmd.action, cmd.run_seconds, &cmd.request_id, now_ms);

        if decision.is_none() {
            if let Some(reason) = self.refusal_reason(cmd, now_ms) {
                warn!("Start '{}' refused: {:?}", cmd.request_id, reason);
                sink.emit(&AppEvent::CommandRefused {
                    request_id: cmd.request_id.clone(),
                    reason,
                });
            }
            return;
        }

        self.apply(decision, StopCause::Command, now_ms, relay, mqtt, sink);
    }

    /// Reconstruct why a start produced `None`.  The decision itself does
    /// not carry this; it is read back from controller state.
    fn refusal_reason(&self, cmd: &PumpCommand, now_ms: u32) -> Option<RefusalReason> {
        if cmd.action == ACTION_STOP {
            return None;
        }
        RefusalReason::from_interlock(self.controller.interlock_status(now_ms)).or(
            (cmd.run_seconds <= 0).then_some(RefusalReason::InvalidDuration),
        )
    }

    fn on_tick(
        &mut self,
        now_ms: u32,
        relay: &mut impl RelayPort,
        mqtt: &mut impl MqttPort,
        sink: &mut impl EventSink,
    ) {
        // Only while stopped: a later start owns the relay.
        if self.relay_release_pending && !self.controller.is_running() {
            self.release_relay(relay);
        }

        if !self.connected {
            let decision = self.controller.on_mqtt_disconnected();
            self.apply(decision, StopCause::ConnectionLost, now_ms, relay, mqtt, sink);
            return;
        }

        self.ensure_subscribed(now_ms, mqtt, sink);

        let decision = self.controller.on_tick(now_ms);
        self.apply(decision, StopCause::Timeout, now_ms, relay, mqtt, sink);

        if now_ms.wrapping_sub(self.last_state_publish_ms) >= self.state_publish_interval_ms {
            self.publish_state(now_ms, mqtt, sink);
        }
    }

    /// Apply a decision to the controller and the relay in one step, then
    /// report the new state.
    fn apply(
        &mut self,
        decision: PumpDecision,
        cause: StopCause,
        now_ms: u32,
        relay: &mut impl RelayPort,
        mqtt: &mut impl MqttPort,
        sink: &mut impl EventSink,
    ) {
        match &decision {
            PumpDecision::None => return,
            PumpDecision::Start {
                run_seconds,
                request_id,
            } => {
                self.controller.apply_decision(&decision, now_ms, &self.clock);
                match relay.set_relay(true) {
                    Ok(()) => {
                        self.relay_release_pending = false;
                        info!("Pump ON for {} s (request '{}')", run_seconds, request_id);
                        sink.emit(&AppEvent::PumpStarted {
                            run_seconds: *run_seconds,
                            request_id: request_id.clone(),
                        });
                    }
                    Err(e) => {
                        error!("Relay drive failed ({}), reverting start", e);
                        let stop = PumpDecision::Stop {
                            request_id: request_id.clone(),
                        };
                        self.controller.apply_decision(&stop, now_ms, &self.clock);
                        self.release_relay(relay);
                        sink.emit(&AppEvent::PumpStopped {
                            request_id: request_id.clone(),
                            cause: StopCause::RelayFault,
                        });
                    }
                }
            }
            PumpDecision::Stop { request_id } => {
                let was_running = self.controller.is_running();
                self.controller.apply_decision(&decision, now_ms, &self.clock);
                self.release_relay(relay);
                if was_running {
                    info!("Pump OFF ({:?}, request '{}')", cause, request_id);
                    sink.emit(&AppEvent::PumpStopped {
                        request_id: request_id.clone(),
                        cause,
                    });
                }
            }
        }

        self.publish_state(now_ms, mqtt, sink);
    }

    fn release_relay(&mut self, relay: &mut impl RelayPort) {
        match relay.set_relay(false) {
            Ok(()) => self.relay_release_pending = false,
            Err(e) => {
                error!("Relay release failed ({}), will retry", e);
                self.relay_release_pending = true;
            }
        }
    }

    fn ensure_subscribed(&mut self, now_ms: u32, mqtt: &mut impl MqttPort, sink: &mut impl EventSink) {
        if self.subscribed || !self.connected {
            return;
        }

        let result = mqtt
            .subscribe(&self.topics.pump_cmd)
            .and_then(|()| mqtt.subscribe(&self.topics.water_level));
        match result {
            Ok(()) => {
                self.subscribed = true;
                info!("Subscribed to '{}' and '{}'", self.topics.pump_cmd, self.topics.water_level);
                self.publish_state(now_ms, mqtt, sink);
            }
            Err(e) => {
                warn!("Subscribe failed ({}), retrying next tick", e);
                sink.emit(&AppEvent::PublishFailed(LABEL_SUBSCRIBE));
            }
        }
    }

    fn publish_state(&mut self, now_ms: u32, mqtt: &mut impl MqttPort, sink: &mut impl EventSink) {
        if !self.connected {
            return;
        }

        self.last_state_publish_ms = now_ms;
        let payload = PumpStatePayload::from_state(&self.controller.state(), self.clock.iso_utc_now());
        let result = wire::encode(&payload)
            .map_err(Error::from)
            .and_then(|bytes| {
                mqtt.publish(&self.topics.pump_state, &bytes, true)
                    .map_err(Error::from)
            });
        if let Err(e) = result {
            warn!("Pump state publish failed: {}", e);
            sink.emit(&AppEvent::PublishFailed(LABEL_PUMP_STATE));
        }
    }
}
