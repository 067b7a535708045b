//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lansweep_core::relay::DEFAULT_RELAY_PORT;

/// lansweep - LAN discovery server and tools
#[derive(Parser, Debug)]
#[command(name = "lansweep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format (one-shot commands)
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the discovery server (websocket channel + periodic sweeps)
    Run(RunArgs),

    /// Run one sweep and print the resulting device list
    Sweep(SweepArgs),

    /// Print the current device registry contents
    Devices(DevicesArgs),

    /// Probe a single address immediately
    Ping(PingArgs),
}

/// Registry backend selection, shared by all commands.
#[derive(Args, Debug, Clone)]
pub struct RegistryArgs {
    /// Path to the sqlite registry; omit for an in-memory registry
    #[arg(long, env = "LANSWEEP_DB")]
    pub db: Option<PathBuf>,

    /// Use a sqlite registry at the platform data directory
    #[arg(long, conflicts_with = "db")]
    pub durable: bool,
}

impl RegistryArgs {
    /// Resolve the sqlite path, if a durable registry was requested.
    pub fn db_path(&self) -> Option<PathBuf> {
        if self.db.is_some() {
            return self.db.clone();
        }
        if self.durable {
            return lansweep_core::registry::default_db_path();
        }
        None
    }
}

/// Cross-process relay configuration, shared by publishing commands.
#[derive(Args, Debug, Clone)]
pub struct RelayArgs {
    /// UDP port of the cross-process event relay
    #[arg(long, default_value_t = DEFAULT_RELAY_PORT, env = "LANSWEEP_RELAY_PORT")]
    pub relay_port: u16,

    /// Disable the cross-process relay (local delivery only)
    #[arg(long)]
    pub no_relay: bool,
}

/// Sweep tunables, shared by `run` and `sweep`.
#[derive(Args, Debug, Clone)]
pub struct SweepTunables {
    /// Subnet to sweep as a /24 CIDR; auto-detected when omitted
    #[arg(long, env = "LANSWEEP_CIDR")]
    pub cidr: Option<String>,

    /// Number of concurrently in-flight probes per batch
    #[arg(long, default_value = "64")]
    pub batch_size: usize,

    /// Per-probe timeout in milliseconds
    #[arg(long, default_value = "1000")]
    pub probe_timeout_ms: u64,
}

// ==================== Run ====================

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Address to bind the viewer websocket listener on
    #[arg(long, default_value = "0.0.0.0:5000", env = "LANSWEEP_LISTEN")]
    pub listen: String,

    /// Seconds between periodic sweeps
    #[arg(long, default_value = "20", env = "LANSWEEP_SWEEP_INTERVAL")]
    pub sweep_interval_secs: u64,

    /// Maximum length of announced display names
    #[arg(long, default_value = "50")]
    pub name_limit: usize,

    #[command(flatten)]
    pub tunables: SweepTunables,

    #[command(flatten)]
    pub registry: RegistryArgs,

    #[command(flatten)]
    pub relay: RelayArgs,
}

// ==================== Sweep ====================

#[derive(Args, Debug)]
pub struct SweepArgs {
    #[command(flatten)]
    pub tunables: SweepTunables,

    #[command(flatten)]
    pub registry: RegistryArgs,

    #[command(flatten)]
    pub relay: RelayArgs,
}

// ==================== Devices ====================

#[derive(Args, Debug)]
pub struct DevicesArgs {
    #[command(flatten)]
    pub registry: RegistryArgs,
}

// ==================== Ping ====================

#[derive(Args, Debug)]
pub struct PingArgs {
    /// IPv4 address to probe
    pub ip: String,

    /// Probe timeout in milliseconds
    #[arg(long, default_value = "1000")]
    pub probe_timeout_ms: u64,

    #[command(flatten)]
    pub registry: RegistryArgs,

    #[command(flatten)]
    pub relay: RelayArgs,
}
