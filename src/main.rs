//! crepair CLI entry point.

use anyhow::Context;
use clap::Parser;

use controller_repair::cli::{commands, handle_error, Cli, Commands};
use controller_repair::infrastructure::config::ConfigLoader;
use controller_repair::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    // Held until exit so buffered file logs are flushed
    let _logger = match LogConfig::try_from(&config.logging)
        .context("Invalid logging configuration")
        .and_then(|log_config| LoggerImpl::init(&log_config))
    {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Repair(args) => commands::repair::execute(args, config, cli.json).await,
        Commands::Rank(args) => commands::rank::execute(args, config, cli.json).await,
        Commands::Blend(args) => commands::blend::execute(args, config, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
