//! coinpilot event channel client - Entry Point
//!
//! Connects to the dashboard backend, logs every event it pushes, and
//! forwards JSON lines from stdin to it.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// coinpilot event channel client
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via COINPILOT_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Backend origin, overriding the config file
    #[arg(long)]
    origin: Option<String>,

    /// Fixed client id, overriding the config file
    #[arg(long)]
    client_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    coinpilot_ws::init_crypto();

    let args = Args::parse();

    // Config path: CLI arg > COINPILOT_CONFIG env var > default (if present)
    let config_path = args
        .config
        .or_else(|| std::env::var("COINPILOT_CONFIG").ok());

    let mut config = coinpilot_client::AppConfig::load(config_path.as_deref())?;
    config.apply_overrides(args.origin, args.client_id);

    coinpilot_telemetry::init_logging(&config.telemetry.log_level)?;

    info!("Starting coinpilot client v{}", env!("CARGO_PKG_VERSION"));
    info!(
        config_path = config_path.as_deref().unwrap_or(coinpilot_client::config::DEFAULT_CONFIG_PATH),
        origin = %config.origin,
        "Configuration loaded"
    );

    let app = coinpilot_client::Application::new(config)?;
    app.run().await?;

    Ok(())
}
