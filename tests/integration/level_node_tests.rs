//! Integration tests for the LevelNode → LevelAggregator → broker pipeline.

use crate::mock_hw::{FIXED_ISO, FixedWallClock, MockMqtt, RecordingSink};

use wateringrig::app::commands::LevelNodeEvent;
use wateringrig::app::events::{AppEvent, NodeKind};
use wateringrig::app::service::LevelNode;
use wateringrig::config::LevelNodeConfig;
use wateringrig::level::LevelSnapshot;
use wateringrig::wire::Topics;

struct Rig {
    node: LevelNode<FixedWallClock>,
    mqtt: MockMqtt,
    sink: RecordingSink,
    topic: String,
}

impl Rig {
    fn new() -> Self {
        let config = LevelNodeConfig::default();
        let mut node = LevelNode::new(&config, FixedWallClock);
        let mut sink = RecordingSink::new();
        node.start(&mut sink);
        Self {
            node,
            mqtt: MockMqtt::new(),
            sink,
            topic: Topics::new(&config.network.topic_prefix).water_level,
        }
    }

    fn connected() -> Self {
        let mut rig = Self::new();
        rig.send(LevelNodeEvent::Connected, 0);
        rig
    }

    fn send(&mut self, event: LevelNodeEvent, now_ms: u32) {
        self.node.handle(event, now_ms, &mut self.mqtt, &mut self.sink);
    }

    fn sample(&mut self, sensors: [bool; 4], now_ms: u32) {
        self.send(LevelNodeEvent::Sample(sensors), now_ms);
    }

    fn publishes(&self) -> usize {
        self.mqtt.count_on(&self.topic)
    }

    fn last(&self) -> serde_json::Value {
        self.mqtt
            .last_on(&self.topic)
            .map(|p| p.payload.clone())
            .expect("no level published")
    }
}

#[test]
fn start_emits_started() {
    let rig = Rig::new();
    assert!(rig.sink.contains(&AppEvent::Started(NodeKind::Level)));
    assert!(!rig.node.is_connected());
}

#[test]
fn change_is_published_immediately_and_retained() {
    let mut rig = Rig::connected();
    rig.sample([false; 4], 10);
    assert_eq!(rig.publishes(), 0, "dry baseline is not a change");

    rig.sample([true, false, false, false], 20);
    assert_eq!(rig.publishes(), 1);
    let published = rig.mqtt.last_on(&rig.topic).unwrap();
    assert!(published.retain);

    let v = rig.last();
    assert_eq!(v["levelPercent"], 25);
    assert_eq!(v["sensors"], serde_json::json!([true, false, false, false]));
    assert_eq!(v["measuredAt"], FIXED_ISO);
    assert_eq!(v["reportedAt"], FIXED_ISO);
    assert!(rig.sink.contains(&AppEvent::LevelPublished(LevelSnapshot {
        sensors: [true, false, false, false],
        level_percent: 25,
    })));
}

#[test]
fn unchanged_level_follows_heartbeat() {
    let mut rig = Rig::connected();
    let full = [true; 4];
    rig.sample(full, 20);
    assert_eq!(rig.publishes(), 1);
    assert_eq!(rig.last()["levelPercent"], 100);

    rig.sample(full, 300_019);
    assert_eq!(rig.publishes(), 1);
    rig.sample(full, 300_020);
    assert_eq!(rig.publishes(), 2);
    rig.sample(full, 300_070);
    assert_eq!(rig.publishes(), 2);
}

#[test]
fn offline_reading_goes_out_after_reconnect() {
    let mut rig = Rig::new();
    rig.sample([true, true, false, false], 100);
    assert!(rig.mqtt.published.is_empty());

    rig.send(LevelNodeEvent::Connected, 200);
    rig.sample([true, true, false, false], 250);
    assert_eq!(rig.publishes(), 1);
    assert_eq!(rig.last()["levelPercent"], 50);

    rig.send(LevelNodeEvent::Disconnected, 300);
    rig.sample([true, true, true, false], 350);
    assert_eq!(rig.publishes(), 1);
    assert!(rig.sink.contains(&AppEvent::Disconnected));
}

#[test]
fn failed_publish_is_retried_on_next_sample() {
    let mut rig = Rig::connected();
    rig.mqtt.fail_publish = true;
    rig.sample([true, true, true, false], 50);
    assert!(rig.sink.contains(&AppEvent::PublishFailed("waterlevel/state")));
    assert_eq!(rig.node.aggregator().last_sensors(), [false; 4]);

    rig.mqtt.fail_publish = false;
    rig.sample([true, true, true, false], 100);
    assert_eq!(rig.publishes(), 1);
    assert_eq!(rig.last()["levelPercent"], 75);
    assert_eq!(rig.node.aggregator().last_publish_ms(), 100);
}
