//! Curio server binary.

use anyhow::{Context, Result};
use clap::Parser;
use curio_config::CurioConfig;
use curio_core::agent::{DiscoveryAgent, MockDiscoveryAgent};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

/// Streaming product discovery assistant server.
#[derive(Debug, Parser)]
#[command(name = "curio-server", version, about)]
struct Cli {
    /// Path to a YAML config file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the bind address.
    #[arg(long)]
    address: Option<String>,
    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,
}

#[rocket::main]
async fn main() -> Result<()> {
    let _ = env_logger::try_init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CurioConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => CurioConfig::default(),
    };
    if let Some(address) = cli.address {
        config.server.address = address;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    info!(
        "starting curio server (address={}, port={})",
        config.server.address, config.server.port
    );
    // The mock agent is the only provider that ships; real providers plug in
    // through the DiscoveryAgent seam.
    let agent: Arc<dyn DiscoveryAgent> = Arc::new(MockDiscoveryAgent::new());
    curio_server::build(config, agent)
        .launch()
        .await
        .context("server failed to launch")?;
    Ok(())
}
