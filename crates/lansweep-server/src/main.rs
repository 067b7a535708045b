//! lansweep - LAN discovery server and command-line tools.
//!
//! `lansweep run` starts the discovery server: it sweeps the local /24 on
//! an interval, keeps the device registry fresh, and relays device,
//! presence and chat events to connected viewers over websockets. The
//! one-shot subcommands (`sweep`, `devices`, `ping`) share the same
//! registry and relay, so they cooperate with running servers.

mod cli;
mod commands;
mod error;
mod output;
mod server;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use error::{exit_codes, ServerError};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => std::process::exit(exit_codes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<(), ServerError> {
    match cli.command {
        Commands::Run(args) => server::run(args).await,
        Commands::Sweep(args) => commands::run_sweep(args, cli.json).await,
        Commands::Devices(args) => commands::run_devices(args, cli.json).await,
        Commands::Ping(args) => commands::run_ping(args, cli.json).await,
    }
}
