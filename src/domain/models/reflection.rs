//! Reflection domain model.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::memory::FailureSignature;

/// Root-cause category assigned to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootCause {
    SyntaxError,
    UndefinedName,
    TypeMismatch,
    MissingDependency,
    IndexOutOfRange,
    ArithmeticError,
    AssertionFailure,
    Panic,
    Timeout,
    Unknown,
}

impl RootCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SyntaxError => "syntax_error",
            Self::UndefinedName => "undefined_name",
            Self::TypeMismatch => "type_mismatch",
            Self::MissingDependency => "missing_dependency",
            Self::IndexOutOfRange => "index_out_of_range",
            Self::ArithmeticError => "arithmetic_error",
            Self::AssertionFailure => "assertion_failure",
            Self::Panic => "panic",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "syntax_error" => Some(Self::SyntaxError),
            "undefined_name" => Some(Self::UndefinedName),
            "type_mismatch" => Some(Self::TypeMismatch),
            "missing_dependency" => Some(Self::MissingDependency),
            "index_out_of_range" => Some(Self::IndexOutOfRange),
            "arithmetic_error" => Some(Self::ArithmeticError),
            "assertion_failure" => Some(Self::AssertionFailure),
            "panic" => Some(Self::Panic),
            "timeout" => Some(Self::Timeout),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Candidate explanation for a failure of this category.
    pub fn hypothesis(&self) -> &'static str {
        match self {
            Self::SyntaxError => "The candidate is not well-formed source for the target language",
            Self::UndefinedName => "The candidate references a name that is never defined or imported",
            Self::TypeMismatch => "A value is used with an incompatible type or call signature",
            Self::MissingDependency => "The candidate imports a module or crate that is not available",
            Self::IndexOutOfRange => "A collection is indexed with a position or key it does not contain",
            Self::ArithmeticError => "An arithmetic operation receives an invalid operand such as zero",
            Self::AssertionFailure => "The candidate runs but produces results that violate the checks",
            Self::Panic => "The candidate aborts at runtime on an unhandled condition",
            Self::Timeout => "The candidate does not terminate within the time budget",
            Self::Unknown => "The failure does not match a known category",
        }
    }

    /// Actionable instruction for the next candidate.
    pub fn suggested_fix(&self) -> &'static str {
        match self {
            Self::SyntaxError => "Rewrite the offending construct so the candidate parses; check brackets, indentation and delimiters",
            Self::UndefinedName => "Define or import every referenced name before use and check identifiers for typos",
            Self::TypeMismatch => "Convert values to the expected types and match the called function's signature",
            Self::MissingDependency => "Use only the standard library or dependencies known to be installed",
            Self::IndexOutOfRange => "Guard indexing with bounds or membership checks and handle empty inputs",
            Self::ArithmeticError => "Validate operands before arithmetic and handle zero or overflow explicitly",
            Self::AssertionFailure => "Re-read the expected behaviour and correct the logic that produces the wrong result",
            Self::Panic => "Handle the failing condition explicitly instead of aborting",
            Self::Timeout => "Remove unbounded loops or blocking calls and reduce algorithmic complexity",
            Self::Unknown => "Inspect the full error output and change the approach rather than repeating it",
        }
    }
}

impl fmt::Display for RootCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured diagnosis of one failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionResult {
    pub pattern: FailureSignature,
    pub root_cause: RootCause,
    pub hypothesis: String,
    pub suggested_fix: String,
}
