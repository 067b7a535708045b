//! Wire protocol for the viewer websocket channel.
//!
//! Typed message enums instead of string-keyed dispatch: every frame is a
//! JSON object with a `type` tag. `ClientMessage` is what viewers send,
//! `ServerMessage` is everything the server pushes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ChatEnvelope, ChatMessage, Device, PeerSummary};

/// Inbound frames from a connected viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Announce identity; re-announcing updates the name
    Hello { name: String },
    /// Send a chat message (direct when `to` is set, broadcast otherwise)
    Chat(ChatMessage),
    /// Trigger a sweep now (rejected while one is running)
    Scan,
    /// Query the scan-state flag and last completed sweep time
    ScanStatus,
    /// Query the full device list
    ListDevices,
    /// Probe one address immediately
    Ping { ip: String },
}

/// Outbound frames pushed to connected viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// First frame after connect: the viewer's assigned id and source ip
    #[serde(rename_all = "camelCase")]
    Welcome {
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        ip: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    PresenceJoin {
        id: String,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        ip: Option<String>,
    },
    PresenceLeave { id: String },
    PresenceList { peers: Vec<PeerSummary> },
    DevicesUpdate { devices: Vec<Device> },
    #[serde(rename_all = "camelCase")]
    PingResult {
        ip: String,
        alive: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        rtt: Option<i32>,
    },
    Chat(ChatEnvelope),
    #[serde(rename_all = "camelCase")]
    ScanStatus {
        is_scanning: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        last_scan: Option<DateTime<Utc>>,
    },
    #[serde(rename_all = "camelCase")]
    ScanStarted { already_running: bool },
    Error { message: String },
}
