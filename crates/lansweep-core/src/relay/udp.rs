//! UDP multicast transport for the event relay.
//!
//! Each published event is serialized as a JSON frame tagged with the
//! origin process id and multicast to a fixed group. The socket is built
//! with SO_REUSEADDR/SO_REUSEPORT so several server processes on the same
//! host can all join the group and port concurrently. Frames whose origin
//! matches the local process are dropped on receive (multicast loopback
//! would otherwise deliver every event twice).

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use super::Event;
use crate::error::RelayError;

/// Default UDP relay port
pub const DEFAULT_RELAY_PORT: u16 = 3555;

/// Multicast group shared by all cooperating processes
const RELAY_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 42, 99);

/// Frame size bound; a full /24 device snapshot fits comfortably
const MAX_FRAME: usize = 60 * 1024;

#[derive(Serialize, Deserialize)]
struct Frame {
    origin: Uuid,
    event: Event,
}

/// Create a UDP socket with SO_REUSEPORT for concurrent operation.
fn create_reusable_socket(port: u16) -> Result<std::net::UdpSocket, std::io::Error> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    socket.set_reuse_address(true)?;

    #[cfg(unix)]
    socket.set_reuse_port(true)?;

    let addr = SocketAddr::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
    socket.bind(&addr.into())?;

    socket.set_nonblocking(true)?;

    Ok(socket.into())
}

/// Cross-process relay transport.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    group: SocketAddr,
    origin: Uuid,
}

impl UdpTransport {
    /// Join the relay group on `port` and spawn the receive task, which
    /// re-injects remote-origin events into `local`.
    pub async fn spawn(port: u16, local: broadcast::Sender<Event>) -> Result<Self, RelayError> {
        let std_socket =
            create_reusable_socket(port).map_err(|e| RelayError::Transport(e.to_string()))?;
        let socket = UdpSocket::from_std(std_socket)?;

        socket
            .join_multicast_v4(RELAY_GROUP, Ipv4Addr::UNSPECIFIED)
            .map_err(|e| RelayError::Transport(e.to_string()))?;
        socket
            .set_multicast_loop_v4(true)
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let socket = Arc::new(socket);
        let origin = Uuid::new_v4();

        let recv_socket = socket.clone();
        tokio::spawn(async move {
            receive_loop(recv_socket, origin, local).await;
        });

        Ok(Self {
            socket,
            group: SocketAddr::from(SocketAddrV4::new(RELAY_GROUP, port)),
            origin,
        })
    }

    /// Serialize and multicast one event. Fire-and-forget: a full socket
    /// buffer drops the frame rather than blocking the publisher.
    pub fn send(&self, event: &Event) -> Result<(), RelayError> {
        let frame = Frame {
            origin: self.origin,
            event: event.clone(),
        };
        let buf = serde_json::to_vec(&frame)?;
        self.socket.try_send_to(&buf, self.group)?;
        Ok(())
    }
}

async fn receive_loop(socket: Arc<UdpSocket>, origin: Uuid, local: broadcast::Sender<Event>) {
    let mut buf = vec![0u8; MAX_FRAME];

    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, addr)) => {
                let frame: Frame = match serde_json::from_slice(&buf[..len]) {
                    Ok(frame) => frame,
                    Err(e) => {
                        debug!(%addr, error = %e, "dropping malformed relay frame");
                        continue;
                    }
                };

                // Skip our own multicast loopback.
                if frame.origin == origin {
                    continue;
                }

                let _ = local.send(frame.event);
            }
            Err(e) => {
                warn!(error = %e, "relay receive error");
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_round_trip() {
        let frame = Frame {
            origin: Uuid::new_v4(),
            event: Event::PingResult {
                ip: "10.0.0.1".to_string(),
                alive: true,
                rtt: Some(2),
            },
        };

        let buf = serde_json::to_vec(&frame).unwrap();
        let back: Frame = serde_json::from_slice(&buf).unwrap();
        assert_eq!(back.origin, frame.origin);
        assert_eq!(back.event, frame.event);
    }

    #[tokio::test]
    async fn test_own_frames_are_not_reinjected() {
        let (local, mut sub) = broadcast::channel(16);
        let transport = UdpTransport::spawn(0, local).await;

        // Port 0 binds an ephemeral port, so the frame never reaches the
        // group; this only exercises construction and the send path.
        if let Ok(transport) = transport {
            let _ = transport.send(&Event::DevicesUpdated { devices: vec![] });
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            assert!(sub.try_recv().is_err());
        }
    }
}
