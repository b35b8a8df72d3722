use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use webhook_proxy::config::Config;
use webhook_proxy::logging;
use webhook_proxy::proxy::{self, EndpointRegistrar, MetricsRegistry};
use webhook_proxy::server::{listener, Router};

/// Receives webhooks and forwards them to configured destinations
#[derive(Parser)]
#[command(name = "webhook-proxy")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = Config::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    logging::init(&cfg.logging, &cfg.telemetry);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting webhook-proxy");

    let endpoints = cfg.build_endpoints()?;
    let metrics = Arc::new(MetricsRegistry::new());
    let registrar = EndpointRegistrar::new(&endpoints, proxy::build_client()?, metrics);
    let router = Arc::new(Router::new(registrar, env!("CARGO_PKG_VERSION")));
    let addr = cfg.listen_addr();

    tokio::select! {
        res = listener::run(&addr, router) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
