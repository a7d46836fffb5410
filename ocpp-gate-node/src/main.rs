//! OCPP Gate Node - central system front door
//!
//! Accepts charge point WebSocket connections, admits only stations known to
//! the directory and binds each connection to the endpoint of the OCPP
//! version it negotiated.
//!
//! # Usage
//!
//! ```bash
//! # Admit two stations on all OCPP versions
//! ocpp-gate-node --station CP001 --station CP002
//!
//! # Load stations from a file, serve only OCPP 1.6 and 2.0.1
//! ocpp-gate-node --stations-file stations.json \
//!     --protocol ocpp1.6 --protocol ocpp2.0.1
//!
//! # Custom listen address
//! ocpp-gate-node --listen 127.0.0.1:9000 --station EK3-001
//! ```
//!
//! `stations.json` is an array of
//! `{"chargeBoxId": "CP001", "registrationStatus": "Accepted"}` entries.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use ocpp_gate_core::{MemoryDirectory, OcppVersion, RegistrationStatus};
use ocpp_gate_ws::{GateServer, ServerConfig};
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// OCPP charge point admission gate
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to accept charge point connections on
    #[arg(long, default_value = "0.0.0.0:8180")]
    listen: SocketAddr,

    /// Charge box id to admit (can be repeated)
    #[arg(short, long)]
    station: Vec<String>,

    /// JSON file with stations to admit
    #[arg(long)]
    stations_file: Option<PathBuf>,

    /// OCPP version to serve (can be repeated, defaults to all)
    #[arg(short, long)]
    protocol: Vec<OcppVersion>,

    /// Handshake timeout in seconds
    #[arg(long, default_value = "10")]
    handshake_timeout: u64,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Setup logging
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Build the directory
    let directory = match &args.stations_file {
        Some(path) => MemoryDirectory::from_json_file(path)?,
        None => MemoryDirectory::new(),
    };
    for station in &args.station {
        directory.register(station.as_str(), RegistrationStatus::Accepted);
    }
    if directory.is_empty() {
        warn!("No stations configured, every connection will be rejected");
    }

    // Build configuration
    let mut config = ServerConfig::default()
        .with_listen_addr(args.listen)
        .with_handshake_timeout(Duration::from_secs(args.handshake_timeout));
    if !args.protocol.is_empty() {
        config = config.with_versions(args.protocol.iter().copied());
    }

    // Print banner
    let versions: Vec<&str> = config.versions.iter().map(OcppVersion::as_str).collect();
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║            OCPP Gate Node - Charge Point Admission           ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Listen:    {:<49} ║", args.listen);
    println!("║  Stations:  {:<49} ║", directory.len());
    println!("║  Protocols: {:<49} ║", truncate(&versions.join(", "), 49));
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let server = GateServer::new(config, directory);
    let bound = server.bind().await?;

    bound
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("OCPP gate node stopped");
    Ok(())
}

/// Truncate string with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}
