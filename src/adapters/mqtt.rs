//! MQTT adapter.
//!
//! The ESP-IDF MQTT client delivers connection changes and messages on its
//! own task through a callback.  Messages are copied into a bounded
//! `embassy-sync` channel; link changes bump a [`LinkMonitor`] counter that
//! can never overflow or be dropped.  The control loop drains both between
//! ticks through [`MqttInbox::drain`], so node state is only ever touched
//! from one thread.
//!
//! ```text
//! ┌──────────────┐ MqttMessage ┌──────────────┐
//! │  MQTT task   │───────────▶│ Control loop │
//! │  (callback)  │ LinkMonitor │   (sync)     │
//! │              │───────────▶│              │
//! └──────────────┘             └──────┬───────┘
//!        ▲        publish/subscribe   │
//!        └────────────────────────────┘
//! ```
//!
//! Outbound traffic goes through [`MqttPort`], QoS 1 throughout.

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::app::commands::{LevelNodeEvent, PumpNodeEvent};

/// Longest topic accepted from the broker.
pub const MAX_TOPIC_LEN: usize = 128;

/// Largest inbound payload accepted from the broker.
pub const MAX_PAYLOAD_LEN: usize = 512;

/// Channel depth for inbound messages.
pub const MESSAGE_DEPTH: usize = 8;

// ── Link state ────────────────────────────────────────────────

/// Broker link change, as seen by the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Connected,
    Disconnected,
}

impl From<LinkEvent> for PumpNodeEvent {
    fn from(event: LinkEvent) -> Self {
        match event {
            LinkEvent::Connected => Self::Connected,
            LinkEvent::Disconnected => Self::Disconnected,
        }
    }
}

impl From<LinkEvent> for LevelNodeEvent {
    fn from(event: LinkEvent) -> Self {
        match event {
            LinkEvent::Connected => Self::Connected,
            LinkEvent::Disconnected => Self::Disconnected,
        }
    }
}

/// Link state written by the client callback.
///
/// The counter advances once per actual up/down change, so it is odd
/// exactly while the link is up.  Repeated `Disconnected` callbacks during
/// reconnect attempts leave it untouched.
pub struct LinkMonitor {
    changes: AtomicU32,
}

impl LinkMonitor {
    pub const fn new() -> Self {
        Self {
            changes: AtomicU32::new(0),
        }
    }

    /// Record the current link state.  Single writer (the client task).
    pub fn set_up(&self, up: bool) {
        let changes = self.changes.load(Ordering::Acquire);
        if is_up_at(changes) != up {
            self.changes.store(changes.wrapping_add(1), Ordering::Release);
        }
    }

    pub fn is_up(&self) -> bool {
        is_up_at(self.changes())
    }

    pub fn changes(&self) -> u32 {
        self.changes.load(Ordering::Acquire)
    }
}

impl Default for LinkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn is_up_at(changes: u32) -> bool {
    changes % 2 == 1
}

/// Loop-side view of [`LinkMonitor`]: turns counter movement into the
/// transitions the node has not seen yet.
#[derive(Debug, Default)]
pub struct LinkTracker {
    seen: u32,
}

impl LinkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catch up to `changes`.  A flap the loop slept through (up, down,
    /// up) still reports the drop so the node runs its fail-safe.
    pub fn advance_to(&mut self, changes: u32) -> &'static [LinkEvent] {
        if changes == self.seen {
            return &[];
        }
        let was_up = is_up_at(self.seen);
        self.seen = changes;
        match (was_up, is_up_at(changes)) {
            (true, true) => &[LinkEvent::Disconnected, LinkEvent::Connected],
            (true, false) => &[LinkEvent::Disconnected],
            (false, true) => &[LinkEvent::Connected],
            (false, false) => &[],
        }
    }
}

// ── Messages ──────────────────────────────────────────────────

/// Received message, stamped with the link counter it arrived under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttMessage {
    pub topic: heapless::String<MAX_TOPIC_LEN>,
    pub payload: heapless::Vec<u8, MAX_PAYLOAD_LEN>,
    pub link_changes: u32,
}

impl MqttMessage {
    /// Copy a received message into fixed buffers.  Oversized messages are
    /// dropped.
    pub fn new(topic: &str, payload: &[u8], link_changes: u32) -> Option<Self> {
        let Ok(topic_buf) = heapless::String::try_from(topic) else {
            warn!("MQTT: dropping message, topic too long ({} bytes)", topic.len());
            return None;
        };
        let Ok(payload_buf) = heapless::Vec::from_slice(payload) else {
            warn!(
                "MQTT: dropping message on '{}', payload too long ({} bytes)",
                topic,
                payload.len()
            );
            return None;
        };
        Some(Self {
            topic: topic_buf,
            payload: payload_buf,
            link_changes,
        })
    }
}

/// MQTT task → control loop.
pub type MessageQueue = Channel<CriticalSectionRawMutex, MqttMessage, MESSAGE_DEPTH>;

// ── Inbox ─────────────────────────────────────────────────────

/// What the control loop receives from [`MqttInbox::drain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound<'a> {
    Link(LinkEvent),
    Message { topic: &'a str, payload: &'a [u8] },
}

/// Everything the client callback shares with the control loop.  Lives in
/// a `static` in each binary.
pub struct MqttInbox {
    messages: MessageQueue,
    link: LinkMonitor,
}

impl MqttInbox {
    pub const fn new() -> Self {
        Self {
            messages: MessageQueue::new(),
            link: LinkMonitor::new(),
        }
    }

    pub fn link(&self) -> &LinkMonitor {
        &self.link
    }

    /// Callback side: record a link change.
    pub fn set_link_up(&self, up: bool) {
        self.link.set_up(up);
    }

    /// Callback side: queue a message; never blocks.  A full queue drops
    /// the message, never a link change.
    pub fn push_message(&self, topic: &str, payload: &[u8]) {
        let Some(msg) = MqttMessage::new(topic, payload, self.link.changes()) else {
            return;
        };
        if self.messages.try_send(msg).is_err() {
            warn!("MQTT: message queue full, dropping message on '{}'", topic);
        }
    }

    /// Loop side: deliver queued messages and link transitions in arrival
    /// order, then any link change that came after the last message.
    pub fn drain(&self, tracker: &mut LinkTracker, mut handle: impl FnMut(Inbound<'_>)) {
        while let Ok(msg) = self.messages.try_receive() {
            for &event in tracker.advance_to(msg.link_changes) {
                handle(Inbound::Link(event));
            }
            handle(Inbound::Message {
                topic: &msg.topic,
                payload: &msg.payload,
            });
        }
        for &event in tracker.advance_to(self.link.changes()) {
            handle(Inbound::Link(event));
        }
    }
}

impl Default for MqttInbox {
    fn default() -> Self {
        Self::new()
    }
}

// ── ESP-IDF client ────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::MqttAdapter;

#[cfg(target_os = "espidf")]
mod esp {
    use core::time::Duration;

    use esp_idf_svc::mqtt::client::{
        Details, EspMqttClient, EventPayload, MqttClientConfiguration, QoS,
    };
    use log::{info, warn};

    use super::MqttInbox;
    use crate::app::ports::MqttPort;
    use crate::config::NetworkConfig;
    use crate::error::CommsError;

    /// Owns the ESP-IDF client.  Reconnects are handled by the client
    /// itself and surface through the inbox's [`LinkMonitor`](super::LinkMonitor).
    pub struct MqttAdapter {
        client: EspMqttClient<'static>,
        inbox: &'static MqttInbox,
    }

    impl MqttAdapter {
        pub fn connect(
            config: &NetworkConfig,
            inbox: &'static MqttInbox,
        ) -> Result<Self, CommsError> {
            let url = config.mqtt_url();
            let conf = MqttClientConfiguration {
                client_id: Some(&config.mqtt_client_id),
                username: config.mqtt_user.as_deref(),
                password: config.mqtt_password.as_deref(),
                keep_alive_interval: Some(Duration::from_secs(30)),
                reconnect_timeout: Some(Duration::from_millis(u64::from(config.mqtt_retry_ms))),
                ..Default::default()
            };

            let client = EspMqttClient::new_cb(&url, &conf, move |event| {
                match event.payload() {
                    EventPayload::Connected(_) => inbox.set_link_up(true),
                    EventPayload::Disconnected => inbox.set_link_up(false),
                    EventPayload::Received {
                        topic: Some(topic),
                        data,
                        details: Details::Complete,
                        ..
                    } => inbox.push_message(topic, data),
                    EventPayload::Received { .. } => {
                        warn!("MQTT: ignoring fragmented message");
                    }
                    EventPayload::Error(e) => warn!("MQTT: client error: {:?}", e),
                    _ => {}
                }
            })
            .map_err(|e| {
                warn!("MQTT: client init failed: {:?}", e);
                CommsError::MqttConnectFailed
            })?;

            info!("MQTT: client started for {}", url);
            Ok(Self { client, inbox })
        }
    }

    impl MqttPort for MqttAdapter {
        fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), CommsError> {
            if !self.inbox.link().is_up() {
                return Err(CommsError::NotConnected);
            }
            self.client
                .publish(topic, QoS::AtLeastOnce, retain, payload)
                .map(|_| ())
                .map_err(|_| CommsError::MqttPublishFailed)
        }

        fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
            if !self.inbox.link().is_up() {
                return Err(CommsError::NotConnected);
            }
            self.client
                .subscribe(topic, QoS::AtLeastOnce)
                .map(|_| ())
                .map_err(|_| CommsError::MqttSubscribeFailed)
        }
    }
}
