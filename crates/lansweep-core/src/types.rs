//! Type definitions shared across lansweep crates.
//!
//! These types are serialized with serde (camelCase) so the same shapes
//! travel over the viewer websocket and the cross-process relay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A host discovered on the local network.
///
/// Keyed by IP address: the registry never holds two records for the same
/// IP. A record only exists for addresses that answered a probe at least
/// once; `last_seen` is bumped on every subsequent successful probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Stable numeric id, assigned on first sighting
    pub id: i32,
    /// IP address (primary identifier)
    pub ip: String,
    /// Resolved hostname, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// User-assigned alias
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Last measured round-trip time in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtt: Option<i32>,
    /// Timestamp of the last successful probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

/// A connected real-time viewer, as reported in roster snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerSummary {
    /// Ephemeral session id, unique for the lifetime of the connection
    pub id: String,
    /// Display name ("anon" until the peer announces itself)
    pub name: String,
    /// Originating IPv4 address, if it could be derived
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// Inbound chat message as sent by a viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub text: String,
    /// Opaque attachment metadata, passed through untouched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<serde_json::Value>,
    /// Target peer id; absent means broadcast
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

/// A routed chat message, tagged with the resolved sender and target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEnvelope {
    /// Sender display name
    pub from: String,
    /// Sender peer id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_id: Option<String>,
    /// Resolved target peer id for direct messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_id: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<serde_json::Value>,
}

/// Current sweep state of one process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatus {
    pub is_scanning: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scan: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_serializes_camel_case() {
        let device = Device {
            id: 1,
            ip: "192.168.1.10".to_string(),
            hostname: None,
            alias: None,
            rtt: Some(3),
            last_seen: Some(Utc::now()),
        };

        let json = serde_json::to_string(&device).unwrap();
        assert!(json.contains("\"lastSeen\""));
        assert!(!json.contains("\"hostname\""));
    }

    #[test]
    fn test_chat_message_without_target_is_broadcast() {
        let msg: ChatMessage = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert!(msg.to.is_none());
        assert!(msg.attachments.is_none());
    }
}
