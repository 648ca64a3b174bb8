//! Treasury server binary
//!
//! Opens the ledger and keeps it available until interrupted. Collaborator
//! modules link against `treasury_core` directly; this binary exists for
//! operating the store standalone and inspecting its state.

use std::error::Error;
use treasury_core::{Config, Treasury};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting treasury server");

    // Load configuration
    let config = Config::from_env()?;

    // Open treasury
    let treasury = Treasury::open(config).await?;
    tracing::info!("Treasury opened successfully");

    let snapshot = treasury.snapshot()?;
    tracing::info!(
        snapshot = %serde_json::to_string(&snapshot)?,
        "Current bank snapshot"
    );

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down treasury server");
    treasury.shutdown().await?;
    Ok(())
}
