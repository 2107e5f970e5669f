//! # Stats Runtime
//!
//! Entry point: load configuration, install logging, run until Ctrl+C.

use anyhow::Result;
use stats_runtime::{telemetry, RuntimeConfig, StatsRuntime};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = RuntimeConfig::from_env()?;
    telemetry::init_logging(&config.log)?;

    let runtime = StatsRuntime::start(config).await?;

    info!("Stats runtime is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
