//! Chat routing: direct delivery vs. broadcast.
//!
//! Direct messages go to exactly the sender (self-echo) and the resolved
//! target connection, without touching the relay. Everything else is
//! published as a broadcast event so viewers on every process receive it.
//! An unknown target id silently falls back to broadcast; that mirrors the
//! long-standing behavior clients depend on, even though it can mask a
//! stale peer id on the client side.

use crate::presence::{ConnId, PresenceTracker};
use crate::protocol::ServerMessage;
use crate::relay::{Event, Relay};
use crate::types::{ChatEnvelope, ChatMessage};

/// How a message was delivered, for callers that want to observe routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Sent to the sender and the resolved target only
    Direct(ConnId),
    /// Published to every connected peer across all processes
    Broadcast,
}

/// Route one chat message from `sender` and deliver it.
pub async fn route(
    sender: ConnId,
    msg: ChatMessage,
    presence: &PresenceTracker,
    relay: &Relay,
) -> Delivery {
    let (from_id, from) = match presence.identity(sender).await {
        Some((id, name)) => (Some(id), name),
        None => (None, crate::presence::DEFAULT_PEER_NAME.to_string()),
    };

    let target = match msg.to.as_deref() {
        Some(peer_id) => presence.resolve(peer_id).await,
        None => None,
    };

    match target {
        Some(target_conn) => {
            let envelope = ChatEnvelope {
                from,
                from_id,
                to_id: msg.to,
                text: msg.text,
                attachments: msg.attachments,
            };
            let frame = ServerMessage::Chat(envelope);
            presence.send_to(target_conn, frame.clone()).await;
            // Echo to the sender unless it is messaging itself.
            if target_conn != sender {
                presence.send_to(sender, frame).await;
            }
            Delivery::Direct(target_conn)
        }
        None => {
            // No target, or a target id nobody here answers to: broadcast.
            let envelope = ChatEnvelope {
                from,
                from_id,
                to_id: None,
                text: msg.text,
                attachments: msg.attachments,
            };
            relay.publish(Event::Chat(envelope));
            Delivery::Broadcast
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::PeerSender;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn viewer() -> (PeerSender, UnboundedReceiver<ServerMessage>) {
        mpsc::unbounded_channel()
    }

    fn chat_frames(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ChatEnvelope> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let ServerMessage::Chat(envelope) = msg {
                out.push(envelope);
            }
        }
        out
    }

    async fn three_viewers() -> (
        PresenceTracker,
        Vec<ConnId>,
        Vec<UnboundedReceiver<ServerMessage>>,
        Vec<String>,
    ) {
        let tracker = PresenceTracker::default();
        let mut conns = Vec::new();
        let mut rxs = Vec::new();
        let mut ids = Vec::new();

        for i in 0..3 {
            let (tx, rx) = viewer();
            let conn = tracker.connect(tx, &format!("10.0.0.{}", i + 1)).await;
            conns.push(conn);
            rxs.push(rx);
        }
        for conn in &conns {
            let (id, _) = tracker.identity(*conn).await.unwrap();
            ids.push(id);
        }
        (tracker, conns, rxs, ids)
    }

    #[tokio::test]
    async fn test_direct_message_reaches_only_sender_and_target() {
        let (tracker, conns, mut rxs, ids) = three_viewers().await;
        let relay = Relay::local_only();

        // Flush connect-time presence traffic.
        for rx in rxs.iter_mut() {
            while rx.try_recv().is_ok() {}
        }

        let msg = ChatMessage {
            text: "psst".to_string(),
            attachments: None,
            to: Some(ids[1].clone()),
        };
        let delivery = route(conns[0], msg, &tracker, &relay).await;
        assert_eq!(delivery, Delivery::Direct(conns[1]));

        let sender_frames = chat_frames(&mut rxs[0]);
        let target_frames = chat_frames(&mut rxs[1]);
        let third_frames = chat_frames(&mut rxs[2]);

        assert_eq!(sender_frames.len(), 1, "sender gets a self-echo");
        assert_eq!(target_frames.len(), 1);
        assert!(third_frames.is_empty(), "third peer must not see a DM");

        assert_eq!(target_frames[0].from_id.as_deref(), Some(ids[0].as_str()));
        assert_eq!(target_frames[0].to_id.as_deref(), Some(ids[1].as_str()));
        assert_eq!(target_frames[0].text, "psst");
    }

    #[tokio::test]
    async fn test_unknown_target_falls_back_to_broadcast() {
        let (tracker, conns, _rxs, _ids) = three_viewers().await;
        let relay = Relay::local_only();
        let mut events = relay.subscribe();

        let msg = ChatMessage {
            text: "anyone?".to_string(),
            attachments: None,
            to: Some("no-such-peer".to_string()),
        };
        let delivery = route(conns[0], msg, &tracker, &relay).await;
        assert_eq!(delivery, Delivery::Broadcast);

        match events.try_recv().unwrap() {
            Event::Chat(envelope) => {
                assert_eq!(envelope.text, "anyone?");
                assert!(envelope.to_id.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_untargeted_message_broadcasts() {
        let (tracker, conns, _rxs, _ids) = three_viewers().await;
        let relay = Relay::local_only();
        let mut events = relay.subscribe();

        let msg = ChatMessage {
            text: "hello all".to_string(),
            attachments: None,
            to: None,
        };
        assert_eq!(
            route(conns[1], msg, &tracker, &relay).await,
            Delivery::Broadcast
        );
        assert!(matches!(events.try_recv().unwrap(), Event::Chat(_)));
    }

    #[tokio::test]
    async fn test_self_targeted_message_sent_once() {
        let (tracker, conns, mut rxs, ids) = three_viewers().await;
        let relay = Relay::local_only();
        for rx in rxs.iter_mut() {
            while rx.try_recv().is_ok() {}
        }

        let msg = ChatMessage {
            text: "note to self".to_string(),
            attachments: None,
            to: Some(ids[0].clone()),
        };
        route(conns[0], msg, &tracker, &relay).await;
        assert_eq!(chat_frames(&mut rxs[0]).len(), 1);
    }
}
