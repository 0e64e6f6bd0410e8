//! Command-line interface for the repair controller.

pub mod commands;
pub mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::adapters::sqlite::{database_url, initialize_database, PoolConfig, SqlitePersistence};
use crate::domain::models::Config;
use crate::services::MemoryStore;

use commands::{
    analyze::AnalyzeArgs, init::InitArgs, memory::MemoryArgs, optimize::OptimizeArgs,
    run::RunArgs,
};

pub use output::progress::{create_spinner, MultiProgressManager, ProgressBarExt};

#[derive(Parser, Debug)]
#[command(name = "mender")]
#[command(about = "Mender - autonomous iterative code repair", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .mender/config.yaml)
    #[arg(short, long, global = true, env = "MENDER_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the project directory, configuration and database
    Init(InitArgs),
    /// Run the repair loop for one or more goals
    Run(RunArgs),
    /// Inspect the failure ledger and solution cache
    Memory(MemoryArgs),
    /// Report metrics and suggestions for a source file
    Analyze(AnalyzeArgs),
    /// Apply loop and import rewrites to a source file and log the improvement
    Optimize(OptimizeArgs),
}

/// Print an error the way the output mode expects and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let chain: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "causes": chain,
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", console::style("error:").red().bold());
    }
    std::process::exit(1);
}

/// Open the memory store described by the configuration.
///
/// With persistence enabled the ledger is hydrated from SQLite; otherwise the
/// store lives only for this process.
pub async fn open_memory(config: &Config) -> Result<Arc<MemoryStore>> {
    if !config.memory.persist {
        return Ok(Arc::new(MemoryStore::new()));
    }

    let url = database_url(&config.database.path);
    let pool = initialize_database(
        &url,
        Some(PoolConfig::with_max_connections(config.database.max_connections)),
    )
    .await
    .with_context(|| format!("Failed to open database at {}", config.database.path))?;

    let store = MemoryStore::with_backend(Arc::new(SqlitePersistence::new(pool)))
        .await
        .context("Failed to load memory from database")?;
    Ok(Arc::new(store))
}
