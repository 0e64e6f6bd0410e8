//! Generator port - interface for candidate code producers.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::Plan;

/// Errors a generator can report.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeneratorError {
    /// The generator could not be reached or produced nothing usable.
    #[error("Generation unavailable: {0}")]
    Unavailable(String),
}

/// Produces candidate implementations for a goal.
///
/// Implementations may block on a language model or an external process;
/// the controller bounds every call with its own timeout.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Produce a candidate for `goal` given everything learned so far.
    async fn generate(&self, goal: &str, plan: &Plan) -> Result<String, GeneratorError>;
}
