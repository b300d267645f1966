use anyhow::Result;
use api_monitor::config::{self, Config};
use colored::Colorize;
use std::path::Path;
use tracing::info;

/// Execute the config show command
///
/// Prints the effective configuration (defaults, file and environment merged)
pub fn show(config_path: &Path) -> Result<()> {
    println!("{}", "Loading configuration...".yellow());
    info!("Loading configuration for display");

    let cfg = config::load_config(config_path)?;

    println!("{}", "Current Configuration:".green().bold());
    println!();
    println!("{}", render_toml(&cfg)?);

    info!("Configuration displayed successfully");
    Ok(())
}

/// Execute the config validate command
pub fn validate(config_path: &Path) -> Result<()> {
    println!("{}", "Validating configuration...".yellow());
    info!("Validating configuration file");

    let cfg = config::load_config(config_path)?;
    let source = if config_path.exists() {
        config_path.display().to_string()
    } else {
        format!("{} (not found, using defaults)", config_path.display())
    };

    println!("{}", "✓ Configuration is valid".green());
    println!();
    println!("{}", "Summary:".bold());
    println!("  Source: {}", source);
    println!("  Upstream: {}", cfg.upstream.base_url);
    println!("  Slow Threshold: {}ms", cfg.monitoring.slow_threshold_ms);

    info!("Configuration validation successful");
    Ok(())
}

fn render_toml(cfg: &Config) -> Result<String> {
    Ok(toml::to_string_pretty(cfg)?)
}
