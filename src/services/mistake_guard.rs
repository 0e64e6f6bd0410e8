//! Pre-validation mistake guard.
//!
//! Compares a new candidate against the failure ledger. A recorded failure
//! implicates the sub-patterns of its failed code that its error output
//! names (or, for timeouts, its loop shapes), plus the failed candidate as a
//! whole. A new candidate containing an implicated sub-pattern gets a
//! [`Warning`] carrying the failure's occurrence count.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, LazyLock};
use tokio::sync::Mutex;

use crate::domain::models::{FailureRecord, FailureSignature, SubPattern, Warning};
use crate::domain::ports::SubPatternExtractor;
use crate::services::memory_store::MemoryStore;
use crate::services::pattern_extractor::is_identifier_like;

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:from\s+([\w.]+)\s+import\b|import\s+([\w.]+)|use\s+([\w:]+))")
        .expect("import pattern is valid")
});

static CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z_]\w*(?:(?:\.|::)[A-Za-z_]\w*)*)\s*!?\s*\(").expect("call pattern is valid")
});

static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z_]\w*\b").expect("identifier pattern is valid"));

static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"'([^'\n]*)'|"([^"\n]*)"|`([^`\n]*)`"#).expect("quote pattern is valid"));

const CONTROL_FLOW: &[&str] = &[
    "for", "while", "loop", "if", "match", "try", "except", "with", "return", "yield", "await",
];

const LOOP_SHAPES: &[&str] = &["for", "while", "loop"];

const KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "const", "continue", "crate",
    "def", "del", "elif", "else", "enum", "except", "extern", "false", "False", "finally", "fn",
    "for", "from", "global", "if", "impl", "import", "in", "is", "lambda", "let", "loop",
    "match", "mod", "mut", "None", "nonlocal", "not", "or", "pass", "pub", "raise", "ref",
    "return", "self", "Self", "static", "struct", "super", "trait", "true", "True", "try",
    "type", "use", "where", "while", "with", "yield",
];

/// Default extractor: imports, called APIs, referenced identifiers,
/// control-flow keywords and a whitespace-insensitive fingerprint.
#[derive(Debug, Clone, Default)]
pub struct StructuralExtractor;

impl StructuralExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl SubPatternExtractor for StructuralExtractor {
    fn extract(&self, code: &str) -> BTreeSet<SubPattern> {
        let mut patterns = BTreeSet::new();

        let fingerprint = code.split_whitespace().collect::<Vec<_>>().join(" ");
        if fingerprint.is_empty() {
            return patterns;
        }
        patterns.insert(SubPattern::Fingerprint(fingerprint));

        for caps in IMPORT_RE.captures_iter(code) {
            if let Some(m) = caps.iter().skip(1).flatten().next() {
                patterns.insert(SubPattern::Import(m.as_str().to_string()));
            }
        }

        let mut calls = HashSet::new();
        for caps in CALL_RE.captures_iter(code) {
            let path = &caps[1];
            let name = path.rsplit(['.', ':']).next().unwrap_or(path);
            if KEYWORDS.contains(&name) || CONTROL_FLOW.contains(&name) {
                continue;
            }
            calls.insert(name.to_string());
            patterns.insert(SubPattern::Api(name.to_string()));
        }

        for m in IDENT_RE.find_iter(code) {
            let word = m.as_str();
            if CONTROL_FLOW.contains(&word) {
                patterns.insert(SubPattern::ControlFlow(word.to_string()));
            } else if !KEYWORDS.contains(&word) && !calls.contains(word) {
                patterns.insert(SubPattern::Identifier(word.to_string()));
            }
        }

        patterns
    }
}

/// Sub-patterns implicated by one signature's records, folded incrementally.
#[derive(Debug, Default)]
struct Implications {
    /// Records of the signature already folded in
    seen: usize,
    occurrence_count: u32,
    patterns: BTreeSet<SubPattern>,
}

impl Implications {
    fn warnings<'a>(
        &'a self,
        signature: &'a FailureSignature,
        candidate: &'a BTreeSet<SubPattern>,
    ) -> impl Iterator<Item = Warning> + 'a {
        self.patterns
            .intersection(candidate)
            .map(move |pattern| Warning {
                signature: signature.clone(),
                sub_pattern: pattern.clone(),
                occurrence_count: self.occurrence_count,
            })
    }
}

/// Screens candidates against the shared failure ledger.
///
/// Never blocks by itself; the controller decides what a warning means.
/// Implicated sub-patterns are cached per signature, so each ledger record
/// is analyzed once.
pub struct MistakeGuard {
    store: Arc<MemoryStore>,
    extractor: Arc<dyn SubPatternExtractor>,
    cache: Mutex<BTreeMap<FailureSignature, Implications>>,
}

impl MistakeGuard {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            extractor: Arc::new(StructuralExtractor::new()),
            cache: Mutex::new(BTreeMap::new()),
        }
    }

    /// Swap the sub-pattern extraction strategy.
    pub fn with_extractor(mut self, extractor: Arc<dyn SubPatternExtractor>) -> Self {
        self.extractor = extractor;
        self.cache = Mutex::new(BTreeMap::new());
        self
    }

    /// Warnings for every sub-pattern of `candidate_code` implicated by a
    /// recorded failure.
    pub async fn check(&self, candidate_code: &str) -> Vec<Warning> {
        let candidate = self.extractor.extract(candidate_code);
        if candidate.is_empty() {
            return Vec::new();
        }

        let sizes = self.store.ledger_sizes().await;
        let mut cache = self.cache.lock().await;
        for (signature, size) in sizes {
            let entry = cache.entry(signature.clone()).or_default();
            if entry.seen >= size {
                continue;
            }
            let fresh = self.store.failures_since(&signature, entry.seen).await;
            self.fold(entry, &fresh);
        }

        cache
            .iter()
            .flat_map(|(signature, implications)| implications.warnings(signature, &candidate))
            .collect()
    }

    /// Pure form of [`check`](Self::check) over an explicit ledger snapshot.
    pub fn check_against(
        &self,
        candidate_code: &str,
        ledger: &[(FailureSignature, Vec<FailureRecord>)],
    ) -> Vec<Warning> {
        let candidate = self.extractor.extract(candidate_code);
        if candidate.is_empty() {
            return Vec::new();
        }

        let mut warnings = Vec::new();
        for (signature, records) in ledger {
            let mut implications = Implications::default();
            self.fold(&mut implications, records);
            warnings.extend(implications.warnings(signature, &candidate));
        }
        warnings
    }

    fn fold(&self, implications: &mut Implications, records: &[FailureRecord]) {
        for record in records {
            implications.patterns.extend(self.implicated(record));
            implications.occurrence_count = record.occurrence_count;
        }
        implications.seen += records.len();
    }

    /// Sub-patterns of a failed candidate that its failure points at.
    pub fn implicated(&self, record: &FailureRecord) -> BTreeSet<SubPattern> {
        let mentioned = mentioned_names(&record.error_text);
        let timed_out = record.signature.is_timeout();

        self.extractor
            .extract(&record.failed_code)
            .into_iter()
            .filter(|pattern| match pattern {
                SubPattern::Fingerprint(_) => true,
                SubPattern::ControlFlow(keyword) => {
                    timed_out && LOOP_SHAPES.contains(&keyword.as_str())
                }
                other => mentioned.contains(other.value()),
            })
            .collect()
    }
}

/// Names an error message points at.
///
/// Quoted names are preferred; without any quotes, only identifier-shaped
/// words count so that ordinary prose never implicates code.
fn mentioned_names(error: &str) -> HashSet<String> {
    let quoted: Vec<&str> = QUOTED_RE
        .captures_iter(error)
        .filter_map(|caps| caps.iter().skip(1).flatten().next())
        .map(|m| m.as_str())
        .collect();

    let mut names = HashSet::new();
    if quoted.is_empty() {
        for m in IDENT_RE.find_iter(error) {
            if is_identifier_like(m.as_str()) {
                names.insert(m.as_str().to_string());
            }
        }
    } else {
        for segment in quoted {
            for m in IDENT_RE.find_iter(segment) {
                names.insert(m.as_str().to_string());
            }
            names.insert(segment.to_string());
        }
    }
    names
}
