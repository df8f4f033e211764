//! Integration tests for the PumpNode → PumpController → relay pipeline.
//!
//! Drives the node with the same event sequence the firmware loop
//! produces and checks relay drives, broker traffic and emitted events.

use crate::mock_hw::{FIXED_ISO, FixedWallClock, MockMqtt, MockRelay, RecordingSink};

use wateringrig::adapters::mqtt::{Inbound, LinkTracker, MESSAGE_DEPTH, MqttInbox};
use wateringrig::app::commands::{PumpCommand, PumpNodeEvent};
use wateringrig::app::events::{AppEvent, NodeKind, RefusalReason, StopCause};
use wateringrig::app::service::PumpNode;
use wateringrig::config::PumpNodeConfig;
use wateringrig::safety::InterlockStatus;

struct Rig {
    node: PumpNode<FixedWallClock>,
    relay: MockRelay,
    mqtt: MockMqtt,
    sink: RecordingSink,
}

impl Rig {
    fn new() -> Self {
        let mut node = PumpNode::new(&PumpNodeConfig::default(), FixedWallClock);
        let mut relay = MockRelay::new();
        let mut sink = RecordingSink::new();
        node.start(&mut relay, &mut sink);
        Self {
            node,
            relay,
            mqtt: MockMqtt::new(),
            sink,
        }
    }

    fn connected() -> Self {
        let mut rig = Self::new();
        rig.send(PumpNodeEvent::Connected, 0);
        rig
    }

    fn send(&mut self, event: PumpNodeEvent, now_ms: u32) {
        self.node
            .handle(event, now_ms, &mut self.relay, &mut self.mqtt, &mut self.sink);
    }

    fn message(&mut self, topic: &str, payload: &[u8], now_ms: u32) {
        self.node.handle_message(
            topic,
            payload,
            now_ms,
            &mut self.relay,
            &mut self.mqtt,
            &mut self.sink,
        );
    }

    fn level(&mut self, percent: i32, now_ms: u32) {
        self.send(PumpNodeEvent::WaterLevel(percent), now_ms);
    }

    fn start(&mut self, run_seconds: i32, request_id: &str, now_ms: u32) {
        self.send(
            PumpNodeEvent::Command(PumpCommand::start(run_seconds, request_id)),
            now_ms,
        );
    }

    fn stop(&mut self, request_id: &str, now_ms: u32) {
        self.send(PumpNodeEvent::Command(PumpCommand::stop(request_id)), now_ms);
    }

    fn state_topic(&self) -> String {
        self.node.topics().pump_state.clone()
    }

    fn state_publishes(&self) -> usize {
        self.mqtt.count_on(&self.state_topic())
    }

    fn last_state(&self) -> serde_json::Value {
        self.mqtt
            .last_on(&self.state_topic())
            .map(|p| p.payload.clone())
            .expect("no pump state published")
    }

    fn refusal(&self) -> Option<RefusalReason> {
        self.sink.events.iter().rev().find_map(|e| match e {
            AppEvent::CommandRefused { reason, .. } => Some(*reason),
            _ => None,
        })
    }
}

// ── Start-up and connection ───────────────────────────────────

#[test]
fn start_releases_relay_before_anything_else() {
    let rig = Rig::new();
    assert_eq!(rig.relay.calls, vec![false]);
    assert!(rig.sink.contains(&AppEvent::Started(NodeKind::Pump)));
    assert!(rig.mqtt.published.is_empty());
}

#[test]
fn connect_subscribes_and_publishes_retained_state() {
    let rig = Rig::connected();
    let topics = rig.node.topics().clone();
    assert_eq!(rig.mqtt.subscriptions, vec![topics.pump_cmd, topics.water_level]);
    assert!(rig.node.is_subscribed());

    let state = rig.mqtt.last_on(&topics.pump_state).unwrap();
    assert!(state.retain);
    assert_eq!(state.payload["running"], false);
    assert!(state.payload["since"].is_null());
    assert_eq!(state.payload["lastRunSeconds"], 0);
    assert_eq!(state.payload["lastRequestId"], "");
    assert_eq!(state.payload["reportedAt"], FIXED_ISO);
}

#[test]
fn subscribe_failure_is_retried_on_tick() {
    let mut rig = Rig::new();
    rig.mqtt.fail_subscribe = true;
    rig.send(PumpNodeEvent::Connected, 0);
    assert!(!rig.node.is_subscribed());
    assert!(rig.sink.contains(&AppEvent::PublishFailed("subscribe")));
    assert_eq!(rig.state_publishes(), 0);

    rig.mqtt.fail_subscribe = false;
    rig.send(PumpNodeEvent::Tick, 50);
    assert!(rig.node.is_subscribed());
    assert_eq!(rig.mqtt.subscriptions.len(), 2);
    assert_eq!(rig.state_publishes(), 1);
}

// ── Timed run ─────────────────────────────────────────────────

#[test]
fn safe_start_runs_for_requested_duration() {
    let mut rig = Rig::connected();
    rig.level(50, 1_000);
    rig.start(30, "req-1", 2_000);

    assert!(rig.relay.on);
    assert!(rig.sink.contains(&AppEvent::PumpStarted {
        run_seconds: 30,
        request_id: "req-1".into(),
    }));
    let state = rig.last_state();
    assert_eq!(state["running"], true);
    assert_eq!(state["since"], FIXED_ISO);
    assert_eq!(state["lastRunSeconds"], 30);
    assert_eq!(state["lastRequestId"], "req-1");

    rig.send(PumpNodeEvent::Tick, 31_999);
    assert!(rig.relay.on, "29.999 s truncates to 29 s");

    rig.send(PumpNodeEvent::Tick, 32_000);
    assert!(!rig.relay.on);
    assert!(rig.sink.contains(&AppEvent::PumpStopped {
        request_id: "req-1".into(),
        cause: StopCause::Timeout,
    }));
    let state = rig.last_state();
    assert_eq!(state["running"], false);
    assert!(state["since"].is_null());
    assert_eq!(state["lastRunSeconds"], 30);
    assert_eq!(state["lastRequestId"], "req-1");
}

#[test]
fn run_timer_survives_millis_rollover() {
    let mut rig = Rig::connected();
    let start = u32::MAX - 400;
    rig.level(75, start - 100);
    rig.start(2, "wrap", start);
    assert!(rig.relay.on);

    rig.send(PumpNodeEvent::Tick, 1_598);
    assert!(rig.relay.on);
    rig.send(PumpNodeEvent::Tick, 1_599);
    assert!(!rig.relay.on);
}

#[test]
fn new_start_while_running_restarts_the_run() {
    let mut rig = Rig::connected();
    rig.level(100, 0);
    rig.start(10, "first", 0);
    rig.start(10, "second", 8_000);

    rig.send(PumpNodeEvent::Tick, 10_000);
    assert!(rig.relay.on, "timer restarted by the second command");
    assert_eq!(rig.node.state().last_request_id, "second");

    rig.send(PumpNodeEvent::Tick, 18_000);
    assert!(!rig.relay.on);
}

// ── Interlock refusals ────────────────────────────────────────

#[test]
fn start_refused_while_level_unknown() {
    let mut rig = Rig::connected();
    rig.start(30, "r", 100);

    assert_eq!(rig.relay.energise_requests(), 0);
    assert!(rig.sink.contains(&AppEvent::CommandRefused {
        request_id: "r".into(),
        reason: RefusalReason::WaterLevelUnknown,
    }));
    assert_eq!(rig.state_publishes(), 1, "a refusal does not republish state");
}

#[test]
fn start_refused_when_reservoir_empty() {
    let mut rig = Rig::connected();
    rig.level(0, 100);
    rig.start(30, "r", 200);
    assert_eq!(rig.relay.energise_requests(), 0);
    assert_eq!(rig.refusal(), Some(RefusalReason::ReservoirEmpty));
}

#[test]
fn stale_level_boundary_is_exclusive() {
    let mut rig = Rig::connected();
    rig.level(75, 0);

    rig.start(5, "late", 600_001);
    assert_eq!(rig.refusal(), Some(RefusalReason::WaterLevelStale));
    assert_eq!(rig.relay.energise_requests(), 0);

    let mut rig = Rig::connected();
    rig.level(75, 0);
    rig.start(5, "edge", 600_000);
    assert!(rig.relay.on);
}

#[test]
fn non_positive_duration_is_refused() {
    let mut rig = Rig::connected();
    rig.level(50, 0);
    rig.start(0, "zero", 10);
    assert_eq!(rig.refusal(), Some(RefusalReason::InvalidDuration));
    rig.start(-5, "neg", 20);
    assert_eq!(rig.refusal(), Some(RefusalReason::InvalidDuration));
    assert_eq!(rig.relay.energise_requests(), 0);
}

// ── Stop paths ────────────────────────────────────────────────

#[test]
fn stop_wins_even_with_empty_reservoir() {
    let mut rig = Rig::connected();
    rig.level(50, 0);
    rig.start(300, "a", 0);
    rig.level(0, 1_000);
    assert!(rig.relay.on, "a level drop alone does not stop a run");

    rig.stop("b", 2_000);
    assert!(!rig.relay.on);
    assert!(rig.sink.contains(&AppEvent::PumpStopped {
        request_id: "b".into(),
        cause: StopCause::Command,
    }));
    assert_eq!(rig.last_state()["running"], false);
}

#[test]
fn losing_the_broker_stops_the_pump() {
    let mut rig = Rig::connected();
    rig.level(50, 0);
    rig.start(300, "a", 0);
    let published = rig.mqtt.published.len();

    rig.send(PumpNodeEvent::Disconnected, 5_000);
    assert!(!rig.relay.on);
    assert!(rig.sink.contains(&AppEvent::PumpStopped {
        request_id: "a".into(),
        cause: StopCause::ConnectionLost,
    }));
    assert_eq!(rig.mqtt.published.len(), published, "no publish while offline");

    let calls = rig.relay.calls.len();
    rig.send(PumpNodeEvent::Tick, 5_200);
    rig.send(PumpNodeEvent::Tick, 5_400);
    assert_eq!(rig.relay.calls.len(), calls, "already stopped, nothing to do");

    rig.send(PumpNodeEvent::Connected, 6_000);
    assert_eq!(rig.mqtt.subscriptions.len(), 4);
    assert_eq!(rig.last_state()["running"], false);
}

#[test]
fn broker_loss_behind_a_full_message_queue_still_stops_the_pump() {
    let inbox = MqttInbox::new();
    let mut link = LinkTracker::new();
    let mut rig = Rig::new();
    let topics = rig.node.topics().clone();

    inbox.set_link_up(true);
    inbox.push_message(&topics.water_level, br#"{"levelPercent":50}"#);
    inbox.push_message(&topics.pump_cmd, br#"{"runSeconds":300,"requestId":"a"}"#);
    inbox.drain(&mut link, |inbound| match inbound {
        Inbound::Link(event) => rig.send(event.into(), 0),
        Inbound::Message { topic, payload } => rig.message(topic, payload, 0),
    });
    assert!(rig.node.is_connected());
    assert!(rig.relay.on);

    for _ in 0..MESSAGE_DEPTH + 4 {
        inbox.push_message(&topics.water_level, br#"{"levelPercent":50}"#);
    }
    inbox.set_link_up(false);
    inbox.drain(&mut link, |inbound| match inbound {
        Inbound::Link(event) => rig.send(event.into(), 5_000),
        Inbound::Message { topic, payload } => rig.message(topic, payload, 5_000),
    });

    assert!(!rig.node.is_connected());
    assert!(!rig.relay.on);
    assert!(rig.sink.contains(&AppEvent::PumpStopped {
        request_id: "a".into(),
        cause: StopCause::ConnectionLost,
    }));
}

#[test]
fn relay_fault_on_start_reverts_to_stopped() {
    let mut rig = Rig::connected();
    rig.relay.fail_on = true;
    rig.level(50, 0);
    rig.start(30, "x", 10);

    assert!(!rig.node.state().running);
    assert!(!rig.relay.on);
    assert_eq!(rig.relay.calls.last(), Some(&false));
    assert!(rig.sink.contains(&AppEvent::PumpStopped {
        request_id: "x".into(),
        cause: StopCause::RelayFault,
    }));
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::PumpStarted { .. })), 0);
    assert_eq!(rig.last_state()["running"], false);
}

#[test]
fn failed_release_is_retried_every_tick() {
    let mut rig = Rig::connected();
    rig.level(50, 0);
    rig.start(30, "a", 0);
    rig.relay.fail_off = true;

    rig.stop("b", 100);
    assert!(!rig.node.state().running);
    assert!(rig.relay.on, "release was rejected");

    rig.send(PumpNodeEvent::Tick, 150);
    assert!(rig.relay.on);

    rig.relay.fail_off = false;
    rig.send(PumpNodeEvent::Tick, 200);
    assert!(!rig.relay.on);
}

#[test]
fn start_after_failed_release_keeps_relay_on() {
    let mut rig = Rig::connected();
    rig.level(50, 0);
    rig.start(30, "a", 0);
    rig.relay.fail_off = true;
    rig.stop("b", 100);
    rig.relay.fail_off = false;

    rig.start(30, "c", 120);
    rig.send(PumpNodeEvent::Tick, 150);
    assert!(rig.node.state().running);
    assert!(rig.relay.on, "pending release must not cut a newer run");
    assert_eq!(rig.relay.on, rig.node.state().running);

    rig.send(PumpNodeEvent::Tick, 30_120);
    assert!(!rig.relay.on);
    assert_eq!(rig.relay.on, rig.node.state().running);
}

// ── Heartbeat ─────────────────────────────────────────────────

#[test]
fn state_is_republished_every_minute() {
    let mut rig = Rig::connected();
    assert_eq!(rig.state_publishes(), 1);

    rig.send(PumpNodeEvent::Tick, 59_999);
    assert_eq!(rig.state_publishes(), 1);
    rig.send(PumpNodeEvent::Tick, 60_000);
    assert_eq!(rig.state_publishes(), 2);
    rig.send(PumpNodeEvent::Tick, 60_050);
    assert_eq!(rig.state_publishes(), 2);
}

// ── Raw broker messages ───────────────────────────────────────

#[test]
fn broker_messages_drive_the_node() {
    let mut rig = Rig::connected();
    let topics = rig.node.topics().clone();

    rig.message(&topics.water_level, br#"{"levelPercent":75,"sensors":[true,true,true,false]}"#, 10);
    assert!(rig.sink.contains(&AppEvent::WaterLevelObserved(75)));

    rig.message(&topics.pump_cmd, br#"{"action":"start","runSeconds":10,"requestId":"m"}"#, 20);
    assert!(rig.relay.on);

    rig.message(&topics.pump_cmd, br#"{"action":"stop","requestId":"m2"}"#, 30);
    assert!(!rig.relay.on);
}

#[test]
fn level_report_without_percent_makes_level_unknown() {
    let mut rig = Rig::connected();
    let topics = rig.node.topics().clone();
    rig.level(50, 0);
    rig.message(&topics.water_level, br#"{"sensors":[true,true,false,false]}"#, 10);

    assert_eq!(rig.node.controller().interlock_status(20), InterlockStatus::Unknown);
    rig.start(5, "r", 20);
    assert_eq!(rig.refusal(), Some(RefusalReason::WaterLevelUnknown));
}

#[test]
fn stop_with_mistyped_fields_still_stops() {
    let mut rig = Rig::connected();
    let topics = rig.node.topics().clone();
    rig.level(50, 0);
    rig.start(300, "a", 0);

    rig.message(&topics.pump_cmd, br#"{"action":"stop","requestId":42}"#, 10);
    assert!(!rig.relay.on);
    assert!(!rig.node.state().running);

    rig.start(300, "b", 20);
    rig.message(&topics.pump_cmd, br#"{"action":"stop","runSeconds":"never"}"#, 30);
    assert!(!rig.relay.on);
}

#[test]
fn null_level_percent_makes_level_unknown() {
    let mut rig = Rig::connected();
    let topics = rig.node.topics().clone();
    rig.level(75, 0);
    rig.message(&topics.water_level, br#"{"levelPercent":null}"#, 10);

    assert!(rig.sink.contains(&AppEvent::WaterLevelObserved(-1)));
    assert_eq!(rig.node.controller().interlock_status(20), InterlockStatus::Unknown);
}

#[test]
fn malformed_payloads_are_rejected_and_ignored() {
    let mut rig = Rig::connected();
    let topics = rig.node.topics().clone();

    rig.message(&topics.pump_cmd, b"{not json", 10);
    assert!(rig.sink.contains(&AppEvent::PayloadRejected("pump/cmd")));
    rig.message(&topics.water_level, b"[1,2", 20);
    assert!(rig.sink.contains(&AppEvent::PayloadRejected("waterlevel/state")));

    let events = rig.sink.events.len();
    rig.message("home/elsewhere", b"{}", 30);
    assert_eq!(rig.sink.events.len(), events);
    assert_eq!(rig.relay.energise_requests(), 0);
}
