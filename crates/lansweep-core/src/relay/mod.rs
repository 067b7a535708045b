//! Event relay: publish/subscribe fan-out between server processes.
//!
//! Three event kinds travel over the relay: device-set changes, single
//! ping results, and routed chat messages. Publish is fire-and-forget with
//! at-most-once delivery per subscriber. Local subscribers always receive
//! the event synchronously; when a cross-process transport is configured
//! the event is additionally serialized and multicast, so stateless server
//! processes agree on events without talking to each other directly.

mod udp;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

use crate::types::{ChatEnvelope, Device};

pub use udp::{UdpTransport, DEFAULT_RELAY_PORT};

/// Capacity of the local fan-out channel. Slow subscribers lose the oldest
/// events rather than stalling publishers.
const LOCAL_CHANNEL_CAPACITY: usize = 256;

/// Events carried by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Event {
    DevicesUpdated { devices: Vec<Device> },
    #[serde(rename_all = "camelCase")]
    PingResult {
        ip: String,
        alive: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        rtt: Option<i32>,
    },
    Chat(ChatEnvelope),
}

/// Publish/subscribe bus with an optional cross-process UDP transport.
pub struct Relay {
    local: broadcast::Sender<Event>,
    transport: Option<UdpTransport>,
}

impl Relay {
    /// Relay without a cross-process transport: publish degenerates to
    /// synchronous local delivery, so single-process deployments behave
    /// identically from the producer's point of view.
    pub fn local_only() -> Self {
        let (local, _) = broadcast::channel(LOCAL_CHANNEL_CAPACITY);
        Self {
            local,
            transport: None,
        }
    }

    /// Relay with a UDP multicast transport on the given port. Events
    /// published by other processes are re-injected into the local channel
    /// by the transport's receive task.
    pub async fn with_udp_transport(port: u16) -> Result<Self, crate::error::RelayError> {
        let (local, _) = broadcast::channel(LOCAL_CHANNEL_CAPACITY);
        let transport = UdpTransport::spawn(port, local.clone()).await?;
        Ok(Self {
            local,
            transport: Some(transport),
        })
    }

    /// Subscribe to all events (local and remote origins alike).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.local.subscribe()
    }

    /// Fire-and-forget publish. A send error only means there is no local
    /// subscriber right now; transport failures degrade to local-only.
    pub fn publish(&self, event: Event) {
        let _ = self.local.send(event.clone());

        if let Some(transport) = &self.transport {
            if let Err(e) = transport.send(&event) {
                warn!(error = %e, "relay transport send failed, delivered locally only");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_publish_reaches_all_subscribers() {
        let relay = Relay::local_only();
        let mut sub_a = relay.subscribe();
        let mut sub_b = relay.subscribe();

        relay.publish(Event::PingResult {
            ip: "10.0.0.1".to_string(),
            alive: true,
            rtt: Some(3),
        });

        for sub in [&mut sub_a, &mut sub_b] {
            match sub.try_recv().unwrap() {
                Event::PingResult { ip, alive, rtt } => {
                    assert_eq!(ip, "10.0.0.1");
                    assert!(alive);
                    assert_eq!(rtt, Some(3));
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_does_not_fail() {
        let relay = Relay::local_only();
        relay.publish(Event::DevicesUpdated { devices: vec![] });
    }

    #[tokio::test]
    async fn test_local_ordering_preserved_per_publisher() {
        let relay = Relay::local_only();
        let mut sub = relay.subscribe();

        for i in 0..5 {
            relay.publish(Event::PingResult {
                ip: format!("10.0.0.{}", i),
                alive: false,
                rtt: None,
            });
        }

        for i in 0..5 {
            match sub.try_recv().unwrap() {
                Event::PingResult { ip, .. } => assert_eq!(ip, format!("10.0.0.{}", i)),
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[test]
    fn test_event_serde_round_trip() {
        let event = Event::Chat(crate::types::ChatEnvelope {
            from: "alice".to_string(),
            from_id: Some("a1".to_string()),
            to_id: None,
            text: "hello".to_string(),
            attachments: None,
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"chat\""));
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
