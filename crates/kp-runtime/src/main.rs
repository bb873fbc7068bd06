//! # Kalapila Chat Runtime
//!
//! Entry point: logging, configuration, then run until Ctrl+C.

use anyhow::{Context, Result};
use kp_runtime::{ChatRuntime, RuntimeConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = RuntimeConfig::from_env().context("Failed to load configuration")?;

    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    if config.gateway.auth.production {
        config
            .validate_for_production()
            .context("Configuration is not production ready")?;
    } else {
        config.validate().context("Invalid configuration")?;
        if config.gateway.auth.secret.is_empty() {
            warn!("KP_TOKEN_SECRET is empty; tokens signed with an empty key are accepted");
        }
    }

    let runtime = ChatRuntime::new(config)?;
    runtime.start().await?;

    info!("Runtime is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await?;

    Ok(())
}
