//! yggdrasil-gateway
//!
//! Runs the loopback gateway as a standalone process. A launcher points its
//! game at the printed address; everything else happens in the library.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use yggdrasil_gateway::config::{load_config_with, ConfigError, GatewayConfig};
use yggdrasil_gateway::lifecycle::wait_for_signal;
use yggdrasil_gateway::observability::{init_logging, metrics::install_prometheus};
use yggdrasil_gateway::Gateway;

#[derive(Parser)]
#[command(name = "yggdrasil-gateway")]
#[command(about = "Loopback gateway for Yggdrasil authentication servers", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// API root of the authentication server (overrides the config file).
    #[arg(short, long)]
    api_root: Option<String>,

    /// Loopback address to bind (overrides the config file).
    #[arg(short, long)]
    bind: Option<String>,
}

fn resolve_config(cli: &Cli) -> Result<GatewayConfig, ConfigError> {
    load_config_with(cli.config.as_deref(), |config| {
        if let Some(api_root) = &cli.api_root {
            config.upstream.api_root = api_root.clone();
        }
        if let Some(bind) = &cli.bind {
            config.listener.bind_address = bind.clone();
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "yggdrasil-gateway starting");
    tracing::info!(
        api_root = %config.upstream.api_root,
        bind_address = %config.listener.bind_address,
        mojang_namespace = config.features.mojang_namespace,
        "Configuration loaded"
    );

    if let Some(address) = &config.observability.metrics_address {
        install_prometheus(address.parse()?)?;
    }

    let gateway = Gateway::new(config)?;
    let addr = gateway.ensure_started().await?;
    println!("http://{addr}");

    wait_for_signal().await;
    tracing::info!("Shutdown signal received");
    gateway.shutdown();
    if !gateway.wait_idle(Duration::from_secs(10)).await {
        tracing::warn!("Connections still open after grace period");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
