use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use api_monitor::{config::ServerConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    match args.get_command() {
        // Tracing for the server is configured from the loaded file
        cli::Commands::Start => {
            commands::start::execute(&args.config).await?;
        }
        cli::Commands::Test => {
            init_tracing(&ServerConfig::default());
            commands::test::execute(&args.config).await?;
        }
        cli::Commands::Config { action } => {
            init_tracing(&ServerConfig::default());
            match action {
                cli::ConfigCommands::Show => commands::config::show(&args.config)?,
                cli::ConfigCommands::Validate => commands::config::validate(&args.config)?,
            }
        }
        cli::Commands::Version => {
            println!("API Monitor v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
