//! Memberdesk - session runtime for the administrative client
//!
//! Loads configuration, restores the last session and keeps it alive until
//! the process is interrupted.

use anyhow::Context as _;
use memberdesk_infra::{config, init_logging};
use memberdesk_lib::AppContext;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();

    let config = config::load().context("failed to load configuration")?;
    init_logging(&config.logging);

    // Logged after the subscriber exists
    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(e) => warn!(error = %e, "Could not load .env file"),
    }

    let ctx = AppContext::new(config).await.context("failed to start session runtime")?;
    info!(authenticated = ctx.session.is_authenticated(), "Memberdesk started");

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("Shutdown requested");

    ctx.shutdown().await.context("failed to shut down cleanly")?;
    Ok(())
}
