// Service binary: assembles the container from environment configuration
// and runs until interrupted. The HTTP transport wraps the same PagePilot
// surface; this binary is the headless core on its own.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pagepilot::{PagePilot, ServiceConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServiceConfig::from_env();
    info!(
        max_sessions = config.max_sessions,
        session_ttl_secs = config.session_ttl_secs,
        headless = config.headless,
        "starting pagepilot"
    );

    let service = PagePilot::start(config).await?;
    info!("pagepilot ready");

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");
    service.shutdown().await;

    Ok(())
}
