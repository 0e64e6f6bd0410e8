//! Code improvement history model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A rewrite applied by the code optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationKind {
    /// Index loops over `range(len(xs))` replaced by direct iteration
    Loops,
    /// Top-level imports hoisted to the head of the file and sorted
    Imports,
}

impl OptimizationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loops => "loops",
            Self::Imports => "imports",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "loops" => Some(Self::Loops),
            "imports" => Some(Self::Imports),
            _ => None,
        }
    }
}

/// One logged optimization with its line counts before and after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementRecord {
    pub kind: OptimizationKind,
    pub before_lines: usize,
    pub after_lines: usize,
    /// Tokens repeated in the improved code
    pub patterns: Vec<String>,
    pub recorded_at: DateTime<Utc>,
}

impl ImprovementRecord {
    pub fn new(kind: OptimizationKind, before: &str, after: &str) -> Self {
        Self {
            kind,
            before_lines: line_count(before),
            after_lines: line_count(after),
            patterns: repeated_tokens(after),
            recorded_at: Utc::now(),
        }
    }

    /// Lines removed by the rewrite; negative when it grew the code.
    pub fn reduction(&self) -> i64 {
        let before = i64::try_from(self.before_lines).unwrap_or(i64::MAX);
        let after = i64::try_from(self.after_lines).unwrap_or(i64::MAX);
        before - after
    }
}

/// Aggregate over the improvement history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningStats {
    pub total_improvements: usize,
    /// Distinct repeated tokens seen across all improved code
    pub pattern_count: usize,
    /// Mean line reduction per improvement
    pub avg_reduction: f64,
}

/// Line count as a `\n` split: an empty string counts as one line.
fn line_count(code: &str) -> usize {
    code.split('\n').count()
}

/// Whitespace-separated tokens occurring more than once, sorted.
pub fn repeated_tokens(code: &str) -> Vec<String> {
    let mut counts = std::collections::BTreeMap::<&str, usize>::new();
    for token in code.split_whitespace() {
        *counts.entry(token).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(token, _)| token.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_lines_and_patterns() {
        let record = ImprovementRecord::new(
            OptimizationKind::Imports,
            "import b\n\nimport a\nx = a + b",
            "import a\nimport b\n\nx = a + b",
        );
        assert_eq!(record.before_lines, 4);
        assert_eq!(record.after_lines, 4);
        assert_eq!(record.reduction(), 0);
        assert_eq!(record.patterns, vec!["a", "b", "import"]);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(OptimizationKind::from_str("LOOPS"), Some(OptimizationKind::Loops));
        assert_eq!(OptimizationKind::from_str(OptimizationKind::Imports.as_str()), Some(OptimizationKind::Imports));
        assert_eq!(OptimizationKind::from_str("inline"), None);
    }
}
