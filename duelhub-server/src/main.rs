//! DuelHub Game Server
//!
//! Binds the WebSocket endpoint and serves until interrupted.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use duelhub::{GameServer, ServerConfig, VERSION};

#[cfg(feature = "debug-tracing")]
const DEFAULT_FILTER: &str = "duelhub=debug";
#[cfg(not(feature = "debug-tracing"))]
const DEFAULT_FILTER: &str = "duelhub=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::from_env();
    info!("DuelHub Server v{}", VERSION);
    info!(
        max_connections = config.max_connections,
        sweep_interval_secs = config.sweeper.interval.as_secs(),
        retention_secs = config.sweeper.retention.as_secs(),
        "Configuration loaded"
    );

    let server = GameServer::new(config);

    tokio::select! {
        result = server.run() => {
            result.with_context(|| format!("server on {} failed", server.config().bind_addr))?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            info!("Interrupted, shutting down");
            server.shutdown();
        }
    }

    Ok(())
}
