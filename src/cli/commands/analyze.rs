//! Implementation of the `mender analyze` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::CodeAnalysis;
use crate::services::CodeAnalyzer;

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Source file to analyze
    pub file: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct AnalyzeOutput {
    pub file: PathBuf,
    #[serde(flatten)]
    pub analysis: CodeAnalysis,
}

impl CommandOutput for AnalyzeOutput {
    fn to_human(&self) -> String {
        let metrics = &self.analysis.metrics;
        let mut lines = vec![
            format!("{}:", self.file.display()),
            format!("  Lines:       {}", metrics.lines),
            format!("  Complexity:  {}", metrics.complexity),
            format!("  Readability: {}", metrics.readability),
        ];
        if self.analysis.suggestions.is_empty() {
            lines.push("\nNo suggestions.".to_string());
        } else {
            lines.push("\nSuggestions:".to_string());
            for suggestion in &self.analysis.suggestions {
                lines.push(format!("  - {suggestion}"));
            }
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: AnalyzeArgs, json_mode: bool) -> Result<()> {
    let code = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let analysis = CodeAnalyzer::new().analyze(&code);
    output(
        &AnalyzeOutput {
            file: args.file,
            analysis,
        },
        json_mode,
    );
    Ok(())
}
