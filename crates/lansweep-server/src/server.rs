//! The discovery server: viewer websocket channel plus background sweeps.
//!
//! Each process runs one accept loop; connections are sticky to the
//! process that accepted them. Relay events (from this process or a
//! cooperating one) are fanned out to every connected viewer by a single
//! forwarding task, so producers never talk to connections directly.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

use lansweep_core::chat;
use lansweep_core::presence::{ConnId, PresenceTracker};
use lansweep_core::probe::PingProbe;
use lansweep_core::protocol::{ClientMessage, ServerMessage};
use lansweep_core::registry::{open_registry, DeviceRegistry};
use lansweep_core::relay::{Event, Relay};
use lansweep_core::sweep::{SweepOptions, Sweeper};

use crate::cli::RunArgs;
use crate::error::Result;

/// Everything a connection handler needs, cheap to clone.
#[derive(Clone)]
struct App {
    registry: Arc<dyn DeviceRegistry>,
    relay: Arc<Relay>,
    presence: Arc<PresenceTracker>,
    sweeper: Arc<Sweeper>,
}

/// Run the server until the process is stopped.
pub async fn run(args: RunArgs) -> Result<()> {
    let db_path = args.registry.db_path();
    let registry = open_registry(db_path.as_deref());

    let relay = if args.relay.no_relay {
        Arc::new(Relay::local_only())
    } else {
        match Relay::with_udp_transport(args.relay.relay_port).await {
            Ok(relay) => Arc::new(relay),
            Err(e) => {
                warn!(error = %e, "relay transport unavailable, running local-only");
                Arc::new(Relay::local_only())
            }
        }
    };

    let presence = Arc::new(PresenceTracker::new(args.name_limit));
    let sweeper = Arc::new(Sweeper::new(
        Arc::new(PingProbe),
        registry.clone(),
        relay.clone(),
        SweepOptions {
            cidr: args.tunables.cidr.clone(),
            batch_size: args.tunables.batch_size,
            probe_timeout: Duration::from_millis(args.tunables.probe_timeout_ms),
        },
    ));

    let app = App {
        registry,
        relay: relay.clone(),
        presence: presence.clone(),
        sweeper: sweeper.clone(),
    };

    tokio::spawn(
        sweeper
            .clone()
            .run_interval(Duration::from_secs(args.sweep_interval_secs)),
    );
    tokio::spawn(fan_out(relay.subscribe(), presence));

    let listener = TcpListener::bind(&args.listen).await?;
    info!(listen = %args.listen, "lansweep server running");

    loop {
        let (stream, addr) = listener.accept().await?;
        let app = app.clone();
        tokio::spawn(async move {
            handle_connection(stream, addr, app).await;
        });
    }
}

/// Forward every relay event to all of this process's viewers.
async fn fan_out(mut events: broadcast::Receiver<Event>, presence: Arc<PresenceTracker>) {
    loop {
        match events.recv().await {
            Ok(event) => presence.broadcast(&event_to_message(event)).await,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "viewer fan-out lagged, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn event_to_message(event: Event) -> ServerMessage {
    match event {
        Event::DevicesUpdated { devices } => ServerMessage::DevicesUpdate { devices },
        Event::PingResult { ip, alive, rtt } => ServerMessage::PingResult { ip, alive, rtt },
        Event::Chat(envelope) => ServerMessage::Chat(envelope),
    }
}

async fn handle_connection(stream: TcpStream, addr: SocketAddr, app: App) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!(%addr, error = %e, "websocket handshake failed");
            return;
        }
    };
    let (mut write, mut read) = ws.split();

    let (tx, mut outbound) = mpsc::unbounded_channel::<ServerMessage>();
    let conn = app.presence.connect(tx, &addr.ip().to_string()).await;

    // Writer task: drains this connection's queue onto the socket.
    let writer = tokio::spawn(async move {
        while let Some(msg) = outbound.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "failed to serialize outbound frame");
                    continue;
                }
            };
            if write.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => handle_frame(&app, conn, &text).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(%addr, error = %e, "websocket read error");
                break;
            }
        }
    }

    app.presence.disconnect(conn).await;
    writer.abort();
}

async fn handle_frame(app: &App, conn: ConnId, text: &str) {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            // Client fault, not a server one: reject and keep serving.
            let reply = ServerMessage::Error {
                message: format!("malformed request: {}", e),
            };
            app.presence.send_to(conn, reply).await;
            return;
        }
    };

    match msg {
        ClientMessage::Hello { name } => {
            app.presence.announce(conn, &name).await;
        }
        ClientMessage::Chat(chat_msg) => {
            chat::route(conn, chat_msg, &app.presence, &app.relay).await;
        }
        ClientMessage::Scan => {
            // Admission and the reply must agree: claim the slot first,
            // answer from the claim, then run the sweep in the background.
            match app.sweeper.try_begin() {
                Some(admitted) => {
                    app.presence
                        .send_to(
                            conn,
                            ServerMessage::ScanStarted {
                                already_running: false,
                            },
                        )
                        .await;
                    tokio::spawn(async move {
                        if let Err(e) = admitted.run().await {
                            warn!(error = %e, "requested sweep failed");
                        }
                    });
                }
                None => {
                    app.presence
                        .send_to(
                            conn,
                            ServerMessage::ScanStarted {
                                already_running: true,
                            },
                        )
                        .await;
                }
            }
        }
        ClientMessage::ScanStatus => {
            let status = app.sweeper.status();
            let reply = ServerMessage::ScanStatus {
                is_scanning: status.is_scanning,
                last_scan: status.last_scan,
            };
            app.presence.send_to(conn, reply).await;
        }
        ClientMessage::ListDevices => {
            let reply = match app.registry.list().await {
                Ok(devices) => ServerMessage::DevicesUpdate { devices },
                Err(e) => ServerMessage::Error {
                    message: format!("failed to list devices: {}", e),
                },
            };
            app.presence.send_to(conn, reply).await;
        }
        ClientMessage::Ping { ip } => {
            let target: std::net::Ipv4Addr = match ip.parse() {
                Ok(target) => target,
                Err(_) => {
                    let reply = ServerMessage::Error {
                        message: format!("invalid ipv4 address: {}", ip),
                    };
                    app.presence.send_to(conn, reply).await;
                    return;
                }
            };
            let sweeper = app.sweeper.clone();
            tokio::spawn(async move {
                // The result reaches every viewer through the relay.
                if let Err(e) = sweeper.ping_once(target).await {
                    warn!(error = %e, "on-demand probe failed");
                }
            });
        }
    }
}
