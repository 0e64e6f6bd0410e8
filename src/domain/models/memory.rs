//! Memory domain model.
//!
//! Three-tier memory for the repair loop:
//! - Working: the per-run short-term attempt buffer (see [`super::attempt`])
//! - Failure ledger: append-only, signature-keyed history of failed candidates
//! - Solution cache: one best-known solution per problem type (upsert)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::improvement::{ImprovementRecord, LearningStats};

/// Canonical, normalized form of an error message used as a ledger key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureSignature(String);

impl FailureSignature {
    /// Reserved key for generation or validation timeouts.
    ///
    /// Signature extraction never yields this value, so only the controller
    /// can record a timeout.
    pub const TIMEOUT: &'static str = "TIMEOUT";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn timeout() -> Self {
        Self(Self::TIMEOUT.to_string())
    }

    pub fn is_timeout(&self) -> bool {
        self.0 == Self::TIMEOUT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FailureSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FailureSignature {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for FailureSignature {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One failed candidate stored in the failure ledger.
///
/// Records are immutable once appended. `occurrence_count` is the number of
/// records stored under the signature at the time this one was appended, so
/// the latest record always carries the current count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub signature: FailureSignature,
    pub failed_code: String,
    pub error_text: String,
    /// Suggested fix recorded alongside the failure, if reflection ran
    pub fix: Option<String>,
    /// When this signature was first seen
    pub first_seen: DateTime<Utc>,
    /// When this record was appended
    pub last_seen: DateTime<Utc>,
    pub occurrence_count: u32,
}

/// Best-known solution for a problem type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionRecord {
    pub problem_type: String,
    pub solution: String,
    /// Success rate in `[0, 1]`
    pub success_rate: f64,
    pub last_used: DateTime<Utc>,
}

impl SolutionRecord {
    pub fn validate(&self) -> Result<(), String> {
        if self.problem_type.trim().is_empty() {
            return Err("Problem type cannot be empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.success_rate) {
            return Err(format!(
                "Success rate must be within [0, 1], got {}",
                self.success_rate
            ));
        }
        Ok(())
    }
}

/// Everything a persistence backend holds, used to hydrate a store at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Failure records in insertion order
    pub failures: Vec<FailureRecord>,
    pub solutions: Vec<SolutionRecord>,
    /// Optimizer history in insertion order
    #[serde(default)]
    pub improvements: Vec<ImprovementRecord>,
}

/// Aggregate statistics over the shared memory tiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    pub distinct_signatures: usize,
    pub total_failures: usize,
    pub solutions: usize,
    /// Most frequent signatures with their occurrence counts, highest first
    pub top_signatures: Vec<(FailureSignature, u32)>,
    #[serde(default)]
    pub learning: LearningStats,
}
