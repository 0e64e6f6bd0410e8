//! Mistake guard domain model.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::memory::FailureSignature;

/// How the controller reacts to mistake guard warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardMode {
    /// Warnings are advisory; the candidate is still validated.
    #[default]
    Warn,
    /// Any warning vetoes validation of the candidate.
    Block,
}

impl GuardMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warn => "warn",
            Self::Block => "block",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "warn" => Some(Self::Warn),
            "block" => Some(Self::Block),
            _ => None,
        }
    }
}

/// Structural feature of a candidate used to match it against past failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SubPattern {
    /// Imported module or crate path
    Import(String),
    /// Called function, method or macro
    Api(String),
    /// Referenced identifier
    Identifier(String),
    /// Control-flow keyword
    ControlFlow(String),
    /// Whole candidate with whitespace collapsed
    Fingerprint(String),
}

impl SubPattern {
    /// The token this sub-pattern matches on.
    pub fn value(&self) -> &str {
        match self {
            Self::Import(v)
            | Self::Api(v)
            | Self::Identifier(v)
            | Self::ControlFlow(v)
            | Self::Fingerprint(v) => v,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Import(_) => "import",
            Self::Api(_) => "api",
            Self::Identifier(_) => "identifier",
            Self::ControlFlow(_) => "control_flow",
            Self::Fingerprint(_) => "fingerprint",
        }
    }
}

impl fmt::Display for SubPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fingerprint(_) => write!(f, "fingerprint:<identical candidate>"),
            other => write!(f, "{}:{}", other.kind(), other.value()),
        }
    }
}

/// A sub-pattern of the candidate that previously led to a recorded failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub signature: FailureSignature,
    pub sub_pattern: SubPattern,
    /// Number of failures recorded under the signature
    pub occurrence_count: u32,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} previously failed {}x with '{}'",
            self.sub_pattern, self.occurrence_count, self.signature
        )
    }
}
