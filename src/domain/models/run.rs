//! Run domain model: policy, plan context and outcome of one goal run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::analysis::CodeAnalysis;
use super::attempt::{Attempt, DEFAULT_SHORT_TERM_CAPACITY};
use super::guard::{GuardMode, Warning};
use super::memory::{FailureRecord, FailureSignature, SolutionRecord};
use super::reflection::ReflectionResult;

/// Default iteration budget when none is configured.
pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// Options governing a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPolicy {
    /// Iteration budget (must be positive)
    pub max_iterations: u32,
    /// Advisory or vetoing mistake guard
    pub guard_mode: GuardMode,
    /// Capacity of the run's short-term buffer (must be positive)
    pub short_term_capacity: usize,
    /// Solution cache key; derived from the goal when absent
    pub problem_type: Option<String>,
}

impl RunPolicy {
    pub fn new(max_iterations: u32) -> Self {
        Self {
            max_iterations,
            ..Self::default()
        }
    }

    pub fn with_guard_mode(mut self, mode: GuardMode) -> Self {
        self.guard_mode = mode;
        self
    }

    pub fn with_short_term_capacity(mut self, capacity: usize) -> Self {
        self.short_term_capacity = capacity;
        self
    }

    pub fn with_problem_type(mut self, problem_type: impl Into<String>) -> Self {
        self.problem_type = Some(problem_type.into());
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_iterations == 0 {
            return Err("max_iterations must be a positive integer".to_string());
        }
        if self.short_term_capacity == 0 {
            return Err("short_term_capacity must be a positive integer".to_string());
        }
        if let Some(problem_type) = &self.problem_type {
            if problem_type.trim().is_empty() {
                return Err("problem_type cannot be blank".to_string());
            }
        }
        Ok(())
    }
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            guard_mode: GuardMode::default(),
            short_term_capacity: DEFAULT_SHORT_TERM_CAPACITY,
            problem_type: None,
        }
    }
}

/// Everything the generator may use to produce the next candidate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub goal: String,
    /// 1-based iteration the candidate is requested for
    pub iteration: u32,
    pub max_iterations: u32,
    /// Short-term buffer contents, oldest first
    pub recent_attempts: Vec<Attempt>,
    /// Diagnosis of the previous failure, including its suggested fix
    pub last_reflection: Option<ReflectionResult>,
    /// Ledger records for the previous failure's signature and similar ones
    pub related_failures: Vec<FailureRecord>,
    /// Warnings that vetoed the previous candidate
    pub guard_warnings: Vec<Warning>,
    /// Best-known solution for the problem type
    pub cached_solution: Option<SolutionRecord>,
    /// Static analysis of the previous failed candidate
    pub last_analysis: Option<CodeAnalysis>,
}

impl Plan {
    pub fn initial(goal: &str, max_iterations: u32, cached_solution: Option<SolutionRecord>) -> Self {
        Self {
            goal: goal.to_string(),
            iteration: 1,
            max_iterations,
            cached_solution,
            ..Self::default()
        }
    }
}

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Success,
    Exhausted,
    Aborted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Exhausted => "EXHAUSTED",
            Self::Aborted => "ABORTED",
        }
    }
}

/// Why a run was aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    /// Generator, executor or persistence was unreachable
    Infrastructure { message: String },
    /// The caller cancelled the run
    Cancelled,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Infrastructure { message } => write!(f, "infrastructure error: {message}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result of a run, returned for every terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub goal: String,
    pub status: RunStatus,
    /// The passing candidate on success
    pub final_code: Option<String>,
    /// Every completed attempt of the run, in order
    pub attempt_history: Vec<Attempt>,
    /// Distinct failure signatures in first-seen order
    pub failures_seen: Vec<FailureSignature>,
    pub abort_reason: Option<AbortReason>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn iterations_used(&self) -> usize {
        self.attempt_history.len()
    }
}
