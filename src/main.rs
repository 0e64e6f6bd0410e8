//! Mender CLI entry point.

use clap::Parser;

use mender::cli::{commands, handle_error, Cli, Commands};
use mender::infrastructure::config::ConfigLoader;
use mender::infrastructure::logging::{LogConfig, LoggerImpl};

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

    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(args, cli.json).await,
        Commands::Run(args) => commands::run::execute(args, &config, cli.json).await,
        Commands::Memory(args) => commands::memory::execute(args, &config, cli.json).await,
        Commands::Analyze(args) => commands::analyze::execute(args, cli.json).await,
        Commands::Optimize(args) => commands::optimize::execute(args, &config, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
