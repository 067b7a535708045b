//! One-shot command implementations.
//!
//! `sweep` is the standalone worker: it runs one sweep against the shared
//! registry and publishes the refreshed snapshot on the relay, so a running
//! server's viewers pick it up without the two processes talking directly.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use lansweep_core::probe::PingProbe;
use lansweep_core::registry::open_registry;
use lansweep_core::relay::Relay;
use lansweep_core::sweep::{SweepOptions, SweepOutcome, Sweeper};

use crate::cli::{DevicesArgs, PingArgs, RelayArgs, SweepArgs};
use crate::error::{Result, ServerError};
use crate::output::{format_devices, format_ping};

async fn build_relay(args: &RelayArgs) -> Arc<Relay> {
    if args.no_relay {
        return Arc::new(Relay::local_only());
    }
    match Relay::with_udp_transport(args.relay_port).await {
        Ok(relay) => Arc::new(relay),
        Err(e) => {
            warn!(error = %e, "relay transport unavailable, publishing locally only");
            Arc::new(Relay::local_only())
        }
    }
}

/// Run one sweep and print the resulting device list.
pub async fn run_sweep(args: SweepArgs, json: bool) -> Result<()> {
    let db_path = args.registry.db_path();
    let registry = open_registry(db_path.as_deref());
    let relay = build_relay(&args.relay).await;

    let sweeper = Arc::new(Sweeper::new(
        Arc::new(PingProbe),
        registry.clone(),
        relay,
        SweepOptions {
            cidr: args.tunables.cidr,
            batch_size: args.tunables.batch_size,
            probe_timeout: Duration::from_millis(args.tunables.probe_timeout_ms),
        },
    ));

    match sweeper.trigger().await? {
        SweepOutcome::Completed => {}
        SweepOutcome::AlreadyRunning => {
            // Cannot happen for a fresh one-shot sweeper, but keep the
            // contract visible.
            return Err(ServerError::Other("sweep already running".to_string()));
        }
    }

    let devices = registry.list().await.map_err(lansweep_core::CoreError::Registry)?;
    println!("{}", format_devices(&devices, json));
    Ok(())
}

/// Print the registry contents in canonical order.
pub async fn run_devices(args: DevicesArgs, json: bool) -> Result<()> {
    let db_path = args.registry.db_path();
    let registry = open_registry(db_path.as_deref());
    let devices = registry.list().await.map_err(lansweep_core::CoreError::Registry)?;
    println!("{}", format_devices(&devices, json));
    Ok(())
}

/// Probe one address, upsert on success, publish the result.
pub async fn run_ping(args: PingArgs, json: bool) -> Result<()> {
    let ip: Ipv4Addr = args
        .ip
        .parse()
        .map_err(|_| ServerError::InvalidArgument(format!("invalid ipv4 address: {}", args.ip)))?;

    let db_path = args.registry.db_path();
    let registry = open_registry(db_path.as_deref());
    let relay = build_relay(&args.relay).await;

    let sweeper = Sweeper::new(
        Arc::new(PingProbe),
        registry,
        relay,
        SweepOptions {
            cidr: None,
            batch_size: 1,
            probe_timeout: Duration::from_millis(args.probe_timeout_ms),
        },
    );

    let report = sweeper.ping_once(ip).await?;
    println!("{}", format_ping(&args.ip, &report, json));
    Ok(())
}
