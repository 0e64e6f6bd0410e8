//! Memory inspection commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use std::sync::Arc;

use crate::cli::open_memory;
use crate::cli::output::table::TableFormatter;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{
    Config, FailureRecord, FailureSignature, MemoryStats, SolutionRecord,
};
use crate::services::{MemoryStore, PatternExtractor};

#[derive(Args, Debug)]
pub struct MemoryArgs {
    #[command(subcommand)]
    pub command: MemoryCommands,
}

#[derive(Subcommand, Debug)]
pub enum MemoryCommands {
    /// Show ledger and solution cache statistics
    Stats,
    /// List the failure ledger
    Failures {
        /// Show every record stored under this signature
        #[arg(short, long)]
        signature: Option<String>,
    },
    /// List cached solutions
    Solutions,
    /// Print the failure signature extracted from an error text
    Signature {
        /// Raw error output
        text: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct StatsOutput {
    #[serde(flatten)]
    pub stats: MemoryStats,
}

impl CommandOutput for StatsOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            "Memory Statistics:".to_string(),
            format!("  Distinct signatures: {}", self.stats.distinct_signatures),
            format!("  Failure records:     {}", self.stats.total_failures),
            format!("  Cached solutions:    {}", self.stats.solutions),
        ];
        if !self.stats.top_signatures.is_empty() {
            lines.push("\nMost frequent failures:".to_string());
            for (signature, count) in &self.stats.top_signatures {
                lines.push(format!("  {count:>4}  {signature}"));
            }
        }
        let learning = &self.stats.learning;
        lines.push("\nOptimizer history:".to_string());
        lines.push(format!("  Improvements:        {}", learning.total_improvements));
        lines.push(format!("  Learned patterns:    {}", learning.pattern_count));
        lines.push(format!("  Avg line reduction:  {:.2}", learning.avg_reduction));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct LedgerOutput {
    /// Latest record per signature
    pub entries: Vec<(FailureSignature, FailureRecord)>,
}

impl CommandOutput for LedgerOutput {
    fn to_human(&self) -> String {
        if self.entries.is_empty() {
            return "No failures recorded.".to_string();
        }
        format!(
            "{}\n\nShowing {} signature(s)",
            TableFormatter::new().format_ledger(&self.entries),
            self.entries.len()
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct FailuresOutput {
    pub signature: FailureSignature,
    pub records: Vec<FailureRecord>,
}

impl CommandOutput for FailuresOutput {
    fn to_human(&self) -> String {
        if self.records.is_empty() {
            return format!("No failures recorded for: {}", self.signature);
        }
        format!(
            "Failures for: {}\n{}",
            self.signature,
            TableFormatter::new().format_failures(&self.records)
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct SolutionsOutput {
    pub solutions: Vec<SolutionRecord>,
}

impl CommandOutput for SolutionsOutput {
    fn to_human(&self) -> String {
        if self.solutions.is_empty() {
            return "No solutions cached.".to_string();
        }
        TableFormatter::new().format_solutions(&self.solutions)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct SignatureOutput {
    pub signature: FailureSignature,
}

impl CommandOutput for SignatureOutput {
    fn to_human(&self) -> String {
        self.signature.to_string()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: MemoryArgs, config: &Config, json_mode: bool) -> Result<()> {
    if let MemoryCommands::Signature { text } = &args.command {
        let extractor = PatternExtractor::new(config.memory.signature_max_len);
        output(
            &SignatureOutput {
                signature: extractor.extract(text),
            },
            json_mode,
        );
        return Ok(());
    }

    let store = open_memory(config).await?;
    handle(&args.command, &store, json_mode).await;
    Ok(())
}

async fn handle(command: &MemoryCommands, store: &Arc<MemoryStore>, json_mode: bool) {
    match command {
        MemoryCommands::Stats => {
            output(
                &StatsOutput {
                    stats: store.stats().await,
                },
                json_mode,
            );
        }
        MemoryCommands::Failures {
            signature: Some(signature),
        } => {
            let signature = FailureSignature::new(signature.clone());
            let records = store.recall_failures(&signature).await;
            output(&FailuresOutput { signature, records }, json_mode);
        }
        MemoryCommands::Failures { signature: None } => {
            let entries = store
                .ledger_snapshot()
                .await
                .into_iter()
                .filter_map(|(sig, mut records)| records.pop().map(|latest| (sig, latest)))
                .collect();
            output(&LedgerOutput { entries }, json_mode);
        }
        MemoryCommands::Solutions => {
            output(
                &SolutionsOutput {
                    solutions: store.solutions().await,
                },
                json_mode,
            );
        }
        MemoryCommands::Signature { .. } => {}
    }
}
