use anyhow::Result;
use api_monitor::{config, init_tracing, server};
use colored::Colorize;
use std::path::Path;
use tracing::info;

/// Execute the start command
///
/// Loads configuration, initializes logging from it, and runs the server
/// until a shutdown signal arrives.
pub async fn execute(config_path: &Path) -> Result<()> {
    println!("{}", "Starting API monitor...".green());

    let cfg = config::load_config(config_path)?;
    init_tracing(&cfg.server);

    info!(config = %config_path.display(), "Starting API monitor");

    server::start_server(cfg).await?;

    Ok(())
}
