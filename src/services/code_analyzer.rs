//! Lightweight static analysis of candidate code.

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::models::{CodeAnalysis, CodeMetrics};

/// Lines longer than this are reported.
const MAX_LINE_LEN: usize = 120;

static BRANCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:if|elif|for|while|loop|match)\b").expect("branch pattern is valid")
});

static WILDCARD_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:from\s+\S+\s+import\s+\*|use\s+\S+::\*)").expect("wildcard pattern is valid")
});

/// Computes metrics and improvement suggestions for a candidate.
#[derive(Debug, Clone, Default)]
pub struct CodeAnalyzer;

impl CodeAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, code: &str) -> CodeAnalysis {
        CodeAnalysis {
            metrics: self.metrics(code),
            suggestions: self.suggest_improvements(code),
        }
    }

    pub fn metrics(&self, code: &str) -> CodeMetrics {
        let lines: Vec<&str> = code.lines().collect();
        CodeMetrics {
            lines: lines.len(),
            complexity: lines.iter().filter(|l| BRANCH_RE.is_match(l)).count(),
            readability: lines
                .iter()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty() && !is_comment(l))
                .count(),
        }
    }

    pub fn suggest_improvements(&self, code: &str) -> Vec<String> {
        let mut suggestions = Vec::new();

        if WILDCARD_IMPORT_RE.is_match(code) {
            suggestions.push("Replace wildcard imports with specific imports".to_string());
        }

        let indents: Vec<&str> = code
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| &l[..l.len() - l.trim_start().len()])
            .filter(|indent| !indent.is_empty())
            .collect();
        let tabs = indents.iter().any(|i| i.contains('\t'));
        let spaces = indents.iter().any(|i| i.contains(' '));
        if tabs && spaces {
            suggestions.push("Use consistent indentation".to_string());
        }

        if code.contains("TODO") || code.contains("FIXME") {
            suggestions.push("Address TODO/FIXME comments".to_string());
        }

        let long = code
            .lines()
            .filter(|l| l.chars().count() > MAX_LINE_LEN)
            .count();
        if long > 0 {
            suggestions.push(format!(
                "Split {long} line(s) longer than {MAX_LINE_LEN} characters"
            ));
        }

        suggestions
    }
}

fn is_comment(line: &str) -> bool {
    line.starts_with('#') || line.starts_with("//")
}
