//! Reflection over failed attempts.
//!
//! Turns a failed candidate and its error output into a [`ReflectionResult`]:
//! the failure signature, a root-cause category, a hypothesis and an
//! actionable fix. The classification step is a [`RootCauseClassifier`] so a
//! rule-based matcher and a model-backed diagnosis are interchangeable.

use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use crate::domain::models::{ReflectionResult, RootCause};
use crate::domain::ports::RootCauseClassifier;
use crate::services::pattern_extractor::PatternExtractor;

static RULES: LazyLock<Vec<(Regex, RootCause)>> = LazyLock::new(|| {
    [
        (r"(?i)\btimed?\s*out\b|TimeoutError|deadline exceeded", RootCause::Timeout),
        (
            r"(?i)SyntaxError|IndentationError|expected one of|unexpected token|parse error|unterminated",
            RootCause::SyntaxError,
        ),
        (
            r"(?i)ModuleNotFoundError|ImportError|No module named|unresolved import|can't find crate|cannot find module",
            RootCause::MissingDependency,
        ),
        (
            r"(?i)NameError|UnboundLocalError|is not defined|cannot find (value|function|type|macro)|undefined (variable|reference|name)|not found in this scope",
            RootCause::UndefinedName,
        ),
        (
            r"(?i)IndexError|KeyError|index out of (range|bounds)|out of range",
            RootCause::IndexOutOfRange,
        ),
        (
            r"(?i)ZeroDivisionError|division by zero|divide by zero|overflow|ArithmeticError",
            RootCause::ArithmeticError,
        ),
        (
            r"(?i)AssertionError|assertion.*failed|expected .* but got|test result: FAILED",
            RootCause::AssertionFailure,
        ),
        (
            r"(?i)TypeError|mismatched types|AttributeError|has no attribute|expected .+, found",
            RootCause::TypeMismatch,
        ),
        (
            r"(?i)panicked at|RuntimeError|Traceback|segmentation fault|abort",
            RootCause::Panic,
        ),
    ]
    .into_iter()
    .map(|(pattern, cause)| (Regex::new(pattern).expect("classifier rule is valid"), cause))
    .collect()
});

static SUBJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"['"`]([^'"`\n]{1,64})['"`]"#).expect("subject pattern is valid")
});

/// Classifier matching the error text against known failure shapes.
///
/// Rules are checked in order; the first match wins.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedClassifier;

impl RuleBasedClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify_text(error: &str) -> RootCause {
        RULES
            .iter()
            .find(|(rule, _)| rule.is_match(error))
            .map_or(RootCause::Unknown, |(_, cause)| *cause)
    }
}

#[async_trait]
impl RootCauseClassifier for RuleBasedClassifier {
    fn name(&self) -> &str {
        "rule_based"
    }

    async fn classify(&self, _code: &str, error: &str) -> anyhow::Result<RootCause> {
        Ok(Self::classify_text(error))
    }
}

/// Derives a structured diagnosis for one failure.
pub struct ReflectionEngine {
    extractor: PatternExtractor,
    classifier: Arc<dyn RootCauseClassifier>,
}

impl ReflectionEngine {
    /// Engine using the rule-based classifier.
    pub fn new(extractor: PatternExtractor) -> Self {
        Self {
            extractor,
            classifier: Arc::new(RuleBasedClassifier::new()),
        }
    }

    /// Swap the classification step.
    pub fn with_classifier(mut self, classifier: Arc<dyn RootCauseClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn extractor(&self) -> &PatternExtractor {
        &self.extractor
    }

    /// Reflect on a failed candidate.
    ///
    /// Never fails: a classifier error degrades to [`RootCause::Unknown`].
    pub async fn reflect(&self, code: &str, error: &str) -> ReflectionResult {
        let pattern = self.extractor.extract(error);

        let root_cause = match self.classifier.classify(code, error).await {
            Ok(cause) => cause,
            Err(e) => {
                warn!(
                    classifier = self.classifier.name(),
                    error = %e,
                    "root cause classification failed, falling back to unknown"
                );
                RootCause::Unknown
            }
        };

        let subject = subject_of(error);
        let hypothesis = match subject {
            Some(subject) => format!("{} (involving `{subject}`)", root_cause.hypothesis()),
            None => root_cause.hypothesis().to_string(),
        };
        let suggested_fix = match subject {
            Some(subject) => format!("{}; start with `{subject}`", root_cause.suggested_fix()),
            None => root_cause.suggested_fix().to_string(),
        };

        debug!(
            pattern = %pattern,
            root_cause = %root_cause,
            classifier = self.classifier.name(),
            "reflection complete"
        );

        ReflectionResult {
            pattern,
            root_cause,
            hypothesis,
            suggested_fix,
        }
    }
}

impl Default for ReflectionEngine {
    fn default() -> Self {
        Self::new(PatternExtractor::default())
    }
}

/// The first quoted entity named by the error, if any.
fn subject_of(error: &str) -> Option<&str> {
    SUBJECT_RE
        .captures(error)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}
