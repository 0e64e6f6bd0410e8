//! Executor port - interface for candidate validation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Output of running a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Combined output of the candidate run
    pub output: String,
    /// Whether the candidate passed validation
    pub passed: bool,
}

impl ExecutionResult {
    pub fn passed(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            passed: true,
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            passed: false,
        }
    }
}

/// Errors an executor can report.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutorError {
    /// The candidate did not finish within the executor's own limit.
    #[error("Execution timed out after {0:?}")]
    Timeout(Duration),

    /// The executor itself failed; the candidate was not judged.
    #[error("Execution error: {0}")]
    Failed(String),
}

/// Validates candidates in isolation.
///
/// Isolation and resource limits are owned by the implementation.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Run the candidate and report whether it passed.
    async fn run(&self, candidate_code: &str) -> Result<ExecutionResult, ExecutorError>;
}
