//! Implementation of the `mender optimize` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::cli::open_memory;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, ImprovementRecord, LearningStats};
use crate::services::CodeOptimizer;

#[derive(Args, Debug)]
pub struct OptimizeArgs {
    /// Source file to optimize
    pub file: PathBuf,

    /// Rewrite the file in place instead of printing the result
    #[arg(short, long)]
    pub write: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct OptimizeOutput {
    pub file: PathBuf,
    pub written: bool,
    pub improvements: Vec<ImprovementRecord>,
    pub learning: LearningStats,
    /// Optimized source; omitted when written back to the file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl CommandOutput for OptimizeOutput {
    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        if self.improvements.is_empty() {
            lines.push(format!("{}: nothing to optimize", self.file.display()));
        } else {
            lines.push(format!("{}:", self.file.display()));
            for improvement in &self.improvements {
                lines.push(format!(
                    "  {:<8} {} -> {} lines",
                    improvement.kind.as_str(),
                    improvement.before_lines,
                    improvement.after_lines
                ));
            }
            if self.written {
                lines.push("  (written)".to_string());
            }
        }
        lines.push(format!(
            "\nImprovements so far: {} (avg reduction {:.2} lines, {} learned patterns)",
            self.learning.total_improvements, self.learning.avg_reduction, self.learning.pattern_count
        ));
        if let Some(code) = &self.code {
            lines.push(format!("\n{code}"));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: OptimizeArgs, config: &Config, json_mode: bool) -> Result<()> {
    let code = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let store = open_memory(config).await?;
    let optimization = CodeOptimizer::new()
        .optimize_and_log(&code, &store)
        .await
        .context("Failed to record improvement history")?;

    let written = args.write && optimization.changed();
    if written {
        tokio::fs::write(&args.file, &optimization.code)
            .await
            .with_context(|| format!("Failed to write {}", args.file.display()))?;
    }

    output(
        &OptimizeOutput {
            file: args.file,
            written,
            improvements: optimization.improvements,
            learning: store.learning_stats().await,
            code: (!args.write).then_some(optimization.code),
        },
        json_mode,
    );
    Ok(())
}
