//! Pairhub Server
//!
//! Run with: cargo run -- [--config path/to/config.toml]
//!
//! # Configuration
//!
//! Settings come from a TOML file (see `--print-config`), then `PAIRHUB_*`
//! environment variables, then command-line flags. `RUST_LOG` takes precedence
//! over the configured log level.

use anyhow::Context;
use clap::Parser;
use pairhub::api::{serve, AppState};
use pairhub::config::{generate_default_config, Config, LoggingConfig};
use pairhub::reaper::spawn_idle_reaper;
use pairhub::session::SessionRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "pairhub")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Real-time room server for live pair-coding")]
struct Cli {
    /// Path to a TOML config file (default: search standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Print a default config file and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load_default(),
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    init_tracing(&config.logging);

    tracing::info!("Starting Pairhub v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        grace_period_secs = config.rooms.grace_period_secs,
        max_idle_secs = config.rooms.max_idle_secs,
        sweep_interval_secs = config.rooms.sweep_interval_secs,
        "Room lifecycle settings"
    );

    let registry = Arc::new(SessionRegistry::new(config.rooms.registry_config()));
    let shutdown = CancellationToken::new();

    let reaper = spawn_idle_reaper(
        Arc::clone(&registry),
        config.rooms.reaper_config(),
        shutdown.child_token(),
    );

    let state = AppState::new(Arc::clone(&registry), config.server.clone(), shutdown.clone());

    // Run server until a shutdown signal arrives
    let result = serve(state, &config.server).await;

    tracing::info!("Stopping background tasks...");
    shutdown.cancel();
    registry.shutdown();
    if let Err(e) = reaper.await {
        tracing::warn!(error = %e, "Idle reaper ended abnormally");
    }

    result.context("server error")?;
    tracing::info!("Pairhub stopped");
    Ok(())
}

/// Initialize tracing from the logging config
///
/// Must run after config loading; messages logged while loading are dropped.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("pairhub={},tower_http=debug", logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);

    if logging.is_json() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
