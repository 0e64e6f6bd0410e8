//! Attempt domain model and the short-term attempt buffer.
//!
//! Every iteration of a run produces exactly one [`Attempt`]. The most recent
//! attempts are kept in a [`ShortTermBuffer`], a fixed-capacity ring buffer
//! owned by a single run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::memory::FailureSignature;

/// Default capacity of the short-term buffer.
pub const DEFAULT_SHORT_TERM_CAPACITY: usize = 5;

/// How an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptKind {
    /// The executor ran the candidate and returned a verdict.
    Validated,
    /// Generation or validation exceeded its time budget.
    TimedOut,
    /// The mistake guard vetoed the candidate before validation.
    Vetoed,
}

impl AttemptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validated => "validated",
            Self::TimedOut => "timed_out",
            Self::Vetoed => "vetoed",
        }
    }
}

/// One iteration's candidate, its raw result and verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based iteration index within the run
    pub iteration: u32,
    /// Candidate code produced by the generator (empty if generation timed out)
    pub candidate_code: String,
    /// Raw executor output, or a description of why validation did not happen
    pub raw_result: String,
    /// Whether the candidate passed validation
    pub passed: bool,
    /// How the attempt ended
    pub kind: AttemptKind,
    /// Failure signature for failed attempts
    pub signature: Option<FailureSignature>,
    /// When the attempt completed
    pub timestamp: DateTime<Utc>,
}

impl Attempt {
    /// An attempt the executor validated.
    pub fn validated(
        iteration: u32,
        candidate_code: String,
        raw_result: String,
        passed: bool,
        signature: Option<FailureSignature>,
    ) -> Self {
        Self {
            iteration,
            candidate_code,
            raw_result,
            passed,
            kind: AttemptKind::Validated,
            signature: if passed { None } else { signature },
            timestamp: Utc::now(),
        }
    }

    /// An attempt whose generation or validation ran out of time.
    pub fn timed_out(iteration: u32, candidate_code: String, raw_result: String) -> Self {
        Self {
            iteration,
            candidate_code,
            raw_result,
            passed: false,
            kind: AttemptKind::TimedOut,
            signature: Some(FailureSignature::timeout()),
            timestamp: Utc::now(),
        }
    }

    /// An attempt the mistake guard refused to validate.
    pub fn vetoed(iteration: u32, candidate_code: String, raw_result: String) -> Self {
        Self {
            iteration,
            candidate_code,
            raw_result,
            passed: false,
            kind: AttemptKind::Vetoed,
            signature: None,
            timestamp: Utc::now(),
        }
    }
}

/// Fixed-capacity ring buffer of the most recent attempts.
///
/// Appending to a full buffer evicts the oldest attempt, so the buffer always
/// holds the last `capacity` attempts in chronological order.
#[derive(Debug, Clone)]
pub struct ShortTermBuffer {
    capacity: usize,
    attempts: VecDeque<Attempt>,
}

impl ShortTermBuffer {
    /// Create a buffer holding at most `capacity` attempts.
    ///
    /// A capacity of zero is raised to one; callers validate the policy
    /// before constructing a buffer.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            attempts: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an attempt, returning the evicted oldest attempt if the buffer was full.
    pub fn push(&mut self, attempt: Attempt) -> Option<Attempt> {
        let evicted = if self.attempts.len() == self.capacity {
            self.attempts.pop_front()
        } else {
            None
        };
        self.attempts.push_back(attempt);
        evicted
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Attempt> {
        self.attempts.iter()
    }

    /// The most recent attempt.
    pub fn latest(&self) -> Option<&Attempt> {
        self.attempts.back()
    }

    /// Clone the contents, oldest first.
    pub fn snapshot(&self) -> Vec<Attempt> {
        self.attempts.iter().cloned().collect()
    }
}

impl Default for ShortTermBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SHORT_TERM_CAPACITY)
    }
}
