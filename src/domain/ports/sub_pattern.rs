//! Sub-pattern extractor port - the mistake guard extension point.

use std::collections::BTreeSet;

use crate::domain::models::SubPattern;

/// Derives structural sub-patterns (referenced APIs, imports, control-flow
/// shapes) from a piece of code.
///
/// Implementations must be pure: the same code always yields the same set.
pub trait SubPatternExtractor: Send + Sync {
    fn extract(&self, code: &str) -> BTreeSet<SubPattern>;
}
