//! Presence tracking for connected real-time viewers.
//!
//! Presence is process-local by design: connections are sticky to one
//! process, and the tracker owns both the id→peer and connection→peer
//! associations. Rosters are not synchronized across processes (known
//! limitation of the relay design, not an oversight).

use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::net::ipv4_from_remote;
use crate::protocol::ServerMessage;
use crate::types::PeerSummary;

/// Default display name before a peer announces itself
pub const DEFAULT_PEER_NAME: &str = "anon";

/// Default bound on announced display names
pub const DEFAULT_NAME_LIMIT: usize = 50;

/// Handle identifying one transport connection within this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

/// Outbound queue for one connection's writer task.
pub type PeerSender = mpsc::UnboundedSender<ServerMessage>;

struct Peer {
    id: String,
    name: String,
    ip: Option<String>,
    sender: PeerSender,
}

impl Peer {
    fn summary(&self) -> PeerSummary {
        PeerSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            ip: self.ip.clone(),
        }
    }
}

#[derive(Default)]
struct Inner {
    peers: HashMap<ConnId, Peer>,
    by_peer_id: HashMap<String, ConnId>,
    next_conn: u64,
}

/// Tracker of currently-connected viewers for one process.
pub struct PresenceTracker {
    inner: RwLock<Inner>,
    name_limit: usize,
}

impl PresenceTracker {
    pub fn new(name_limit: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            name_limit,
        }
    }

    /// Register a new connection: assign a fresh peer id, welcome the peer
    /// with it, and broadcast the updated roster to everyone.
    pub async fn connect(&self, sender: PeerSender, remote: &str) -> ConnId {
        let mut inner = self.inner.write().await;

        inner.next_conn += 1;
        let conn = ConnId(inner.next_conn);
        let peer = Peer {
            id: Uuid::new_v4().simple().to_string(),
            name: DEFAULT_PEER_NAME.to_string(),
            ip: ipv4_from_remote(remote),
            sender,
        };

        let welcome = ServerMessage::Welcome {
            id: peer.id.clone(),
            ip: peer.ip.clone(),
        };
        let _ = peer.sender.send(welcome);

        inner.by_peer_id.insert(peer.id.clone(), conn);
        inner.peers.insert(conn, peer);

        debug!(peers = inner.peers.len(), "viewer connected");
        broadcast_roster(&inner);
        conn
    }

    /// Handle an "announce identity" action: truncate and store the name,
    /// then broadcast a join notification plus a refreshed roster.
    /// Re-announcing updates the name and re-emits.
    pub async fn announce(&self, conn: ConnId, name: &str) {
        let mut inner = self.inner.write().await;

        let Some(peer) = inner.peers.get_mut(&conn) else {
            return;
        };

        let name = truncate_name(name, self.name_limit);
        if !name.is_empty() {
            peer.name = name;
        }

        let join = ServerMessage::PresenceJoin {
            id: peer.id.clone(),
            name: peer.name.clone(),
            ip: peer.ip.clone(),
        };
        broadcast_message(&inner, &join);
        broadcast_roster(&inner);
    }

    /// Remove a disconnected peer. Both associations are removed under the
    /// same lock; everyone left gets a leave notification and a roster.
    pub async fn disconnect(&self, conn: ConnId) {
        let mut inner = self.inner.write().await;

        let Some(peer) = inner.peers.remove(&conn) else {
            return;
        };
        inner.by_peer_id.remove(&peer.id);

        debug!(peers = inner.peers.len(), "viewer disconnected");
        broadcast_message(&inner, &ServerMessage::PresenceLeave { id: peer.id });
        broadcast_roster(&inner);
    }

    /// Current roster of this process's connected peers.
    pub async fn roster(&self) -> Vec<PeerSummary> {
        let inner = self.inner.read().await;
        inner.peers.values().map(Peer::summary).collect()
    }

    /// Push a message to every connected peer in this process.
    pub async fn broadcast(&self, msg: &ServerMessage) {
        let inner = self.inner.read().await;
        broadcast_message(&inner, msg);
    }

    /// Push a message to one connection.
    pub async fn send_to(&self, conn: ConnId, msg: ServerMessage) {
        let inner = self.inner.read().await;
        if let Some(peer) = inner.peers.get(&conn) {
            let _ = peer.sender.send(msg);
        }
    }

    /// Resolve a peer id to its connection, if that peer is connected here.
    pub async fn resolve(&self, peer_id: &str) -> Option<ConnId> {
        let inner = self.inner.read().await;
        inner.by_peer_id.get(peer_id).copied()
    }

    /// The sender identity (peer id, display name) behind a connection.
    pub async fn identity(&self, conn: ConnId) -> Option<(String, String)> {
        let inner = self.inner.read().await;
        inner
            .peers
            .get(&conn)
            .map(|p| (p.id.clone(), p.name.clone()))
    }

    pub async fn peer_count(&self) -> usize {
        self.inner.read().await.peers.len()
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new(DEFAULT_NAME_LIMIT)
    }
}

fn truncate_name(name: &str, limit: usize) -> String {
    name.trim().chars().take(limit).collect()
}

fn broadcast_message(inner: &Inner, msg: &ServerMessage) {
    for peer in inner.peers.values() {
        let _ = peer.sender.send(msg.clone());
    }
}

fn broadcast_roster(inner: &Inner) {
    let peers: Vec<PeerSummary> = inner.peers.values().map(Peer::summary).collect();
    broadcast_message(inner, &ServerMessage::PresenceList { peers });
}
