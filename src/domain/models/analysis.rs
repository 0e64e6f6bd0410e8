//! Static code analysis model.

use serde::{Deserialize, Serialize};

/// Cheap structural metrics of a candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeMetrics {
    /// Total number of lines
    pub lines: usize,
    /// Lines containing a branch or loop keyword
    pub complexity: usize,
    /// Non-blank, non-comment lines
    pub readability: usize,
}

/// Metrics plus improvement suggestions for a candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeAnalysis {
    pub metrics: CodeMetrics,
    pub suggestions: Vec<String>,
}
