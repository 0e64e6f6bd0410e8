//! Mechanical rewrites of candidate code.
//!
//! Two rewrites are offered: index loops over `range(len(xs))` become direct
//! iteration, and top-level imports are hoisted and sorted. Each applied
//! rewrite can be logged to the memory store's improvement history.

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ImprovementRecord, OptimizationKind};
use crate::services::memory_store::MemoryStore;

static RANGE_LEN_LOOP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"for\s+(\w+)\s+in\s+range\(len\((\w+)\)\)").expect("loop pattern is valid")
});

/// Result of [`CodeOptimizer::optimize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Optimization {
    pub code: String,
    /// One record per rewrite that changed the code, in application order
    pub improvements: Vec<ImprovementRecord>,
}

impl Optimization {
    pub fn changed(&self) -> bool {
        !self.improvements.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CodeOptimizer;

impl CodeOptimizer {
    pub fn new() -> Self {
        Self
    }

    /// Replace `for i in range(len(xs))` with `for i in xs`.
    pub fn optimize_loops(&self, code: &str) -> String {
        RANGE_LEN_LOOP_RE
            .replace_all(code, "for ${1} in ${2}")
            .into_owned()
    }

    /// Move unindented `import`/`from` lines to the top, sorted; every other
    /// line keeps its relative order.
    pub fn optimize_imports(&self, code: &str) -> String {
        let (mut imports, rest): (Vec<&str>, Vec<&str>) = code
            .split('\n')
            .partition(|line| line.starts_with("import ") || line.starts_with("from "));
        if imports.is_empty() {
            return code.to_string();
        }

        imports.sort_unstable();
        imports.extend(rest);
        imports.join("\n")
    }

    /// Apply every rewrite in turn, recording those that changed the code.
    pub fn optimize(&self, code: &str) -> Optimization {
        let mut improvements = Vec::new();

        let looped = self.optimize_loops(code);
        if looped != code {
            improvements.push(ImprovementRecord::new(OptimizationKind::Loops, code, &looped));
        }

        let imported = self.optimize_imports(&looped);
        if imported != looped {
            improvements.push(ImprovementRecord::new(
                OptimizationKind::Imports,
                &looped,
                &imported,
            ));
        }

        Optimization {
            code: imported,
            improvements,
        }
    }

    /// [`optimize`](Self::optimize), then append each improvement to `store`.
    pub async fn optimize_and_log(
        &self,
        code: &str,
        store: &MemoryStore,
    ) -> DomainResult<Optimization> {
        let optimization = self.optimize(code);
        for improvement in &optimization.improvements {
            store.log_improvement(improvement.clone()).await?;
        }
        Ok(optimization)
    }
}
