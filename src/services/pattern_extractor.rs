//! Failure signature extraction.
//!
//! Normalizes raw error output into a [`FailureSignature`]: identifier-like
//! and numeric-literal tokens collapse onto a single placeholder so that
//! structurally identical failures share one ledger key.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::domain::models::FailureSignature;

/// Default maximum signature length in characters.
pub const DEFAULT_MAX_SIGNATURE_LEN: usize = 50;

/// Token substituted for identifier-like and numeric runs.
pub const PLACEHOLDER: &str = "<*>";

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?P<quoted>'[^'\n]*'|"[^"\n]*"|`[^`\n]*`)"#,
        r#"|(?P<path>(?:[A-Za-z]:)?[\\/][^\s'"`:,()\[\]]+)"#,
        r"|(?P<number>0[xX][0-9a-fA-F]+|\d+(?:\.\d+)?(?:[eE][+-]?\d+)?)",
        r"|(?P<word>[A-Za-z_][A-Za-z0-9_]*(?:(?:\.|::)[A-Za-z_][A-Za-z0-9_]*)*)",
        r"|(?P<space>\s+)",
        r"|(?P<other>.)",
    ))
    .expect("token pattern is valid")
});

/// Derives failure signatures from raw error text.
///
/// Extraction is total and deterministic: every input yields a signature and
/// the same input always yields the same one.
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    max_len: usize,
}

impl PatternExtractor {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Normalize `raw_error` into a signature.
    pub fn extract(&self, raw_error: &str) -> FailureSignature {
        let tokens = tokenize(raw_error);
        let solid: Vec<usize> = (0..tokens.len())
            .filter(|&i| tokens[i].kind != TokenKind::Space)
            .collect();
        let positional: HashSet<usize> = solid
            .iter()
            .enumerate()
            .filter(|(pos, _)| names_entity_by_position(&tokens, &solid, *pos))
            .map(|(_, &i)| i)
            .collect();

        let mut normalized = String::with_capacity(raw_error.len().min(self.max_len * 2));
        let mut pending_space = false;
        let mut last_was_placeholder = false;

        for (i, token) in tokens.iter().enumerate() {
            if token.kind == TokenKind::Space {
                pending_space = !normalized.is_empty();
                continue;
            }

            let placeholder = token.kind == TokenKind::Placeholder || positional.contains(&i);

            if placeholder && last_was_placeholder {
                pending_space = false;
                continue;
            }

            if pending_space {
                normalized.push(' ');
                pending_space = false;
            }

            normalized.push_str(if placeholder { PLACEHOLDER } else { token.text });
            last_was_placeholder = placeholder;
        }

        let truncated: String = normalized.chars().take(self.max_len).collect();
        let signature = truncated.trim_end();
        // The reserved timeout key only comes from the controller.
        if signature == FailureSignature::TIMEOUT {
            return FailureSignature::new(signature.to_lowercase());
        }
        FailureSignature::new(signature)
    }
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIGNATURE_LEN)
    }
}

/// Whether a word token names a program entity rather than describing the error.
///
/// Dotted or `::` paths, snake_case, camelCase and tokens mixing digits are
/// identifier-like. Plain words, PascalCase class names and SHOUTING words are not.
pub(crate) fn is_identifier_like(word: &str) -> bool {
    if word.contains('.') || word.contains("::") || word.contains('_') {
        return true;
    }
    if word.chars().any(|c| c.is_ascii_digit()) {
        return true;
    }
    let mut chars = word.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => chars.any(|c| c.is_ascii_uppercase()),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Space,
    Placeholder,
    Word,
    Other,
}

#[derive(Debug)]
struct Token<'a> {
    text: &'a str,
    kind: TokenKind,
}

fn tokenize(raw: &str) -> Vec<Token<'_>> {
    TOKEN_RE
        .captures_iter(raw)
        .filter_map(|caps| {
            let text = caps.get(0)?.as_str();
            let kind = if caps.name("space").is_some() {
                TokenKind::Space
            } else if caps.name("quoted").is_some()
                || caps.name("path").is_some()
                || caps.name("number").is_some()
            {
                TokenKind::Placeholder
            } else if caps.name("word").is_some() {
                if is_identifier_like(text) {
                    TokenKind::Placeholder
                } else {
                    TokenKind::Word
                }
            } else {
                TokenKind::Other
            };
            Some(Token { text, kind })
        })
        .collect()
}

/// Phrases whose preceding word is the offending name.
const NAMING_SUFFIXES: &[&[&str]] = &[
    &["is", "not", "defined"],
    &["is", "not", "a", "function"],
    &["referenced", "before", "assignment"],
];

/// Nouns whose following word is the offending name.
const NAMING_PREFIXES: &[&str] = &["name", "variable", "attribute", "method"];

/// Words that continue the sentence after a naming prefix rather than name anything.
const FUNCTION_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "be", "by", "cannot", "does", "for", "from", "has", "in",
    "is", "must", "not", "of", "on", "or", "should", "the", "to", "was", "with",
];

/// Whether the plain word at `solid[pos]` names an entity through its
/// surrounding phrase, like `foo is not defined` or `attribute foo`.
fn names_entity_by_position(tokens: &[Token<'_>], solid: &[usize], pos: usize) -> bool {
    let word = &tokens[solid[pos]];
    if word.kind != TokenKind::Word {
        return false;
    }

    let word_at = |p: usize| {
        solid
            .get(p)
            .map(|&i| &tokens[i])
            .filter(|t| t.kind == TokenKind::Word)
            .map(|t| t.text)
    };

    let after_prefix = pos > 0
        && word_at(pos - 1).is_some_and(|prev| {
            NAMING_PREFIXES.iter().any(|n| prev.eq_ignore_ascii_case(n))
        })
        && !FUNCTION_WORDS.iter().any(|f| word.text.eq_ignore_ascii_case(f));

    let before_suffix = NAMING_SUFFIXES.iter().any(|phrase| {
        phrase
            .iter()
            .enumerate()
            .all(|(offset, expected)| word_at(pos + 1 + offset) == Some(*expected))
    });

    after_prefix || before_suffix
}

/// Token-set Jaccard similarity of two signatures in `[0, 1]`.
pub fn similarity(a: &FailureSignature, b: &FailureSignature) -> f64 {
    let left: HashSet<&str> = a.as_str().split_whitespace().collect();
    let right: HashSet<&str> = b.as_str().split_whitespace().collect();

    if left.is_empty() && right.is_empty() {
        return 1.0;
    }

    let intersection = left.intersection(&right).count();
    let union = left.union(&right).count();
    intersection as f64 / union as f64
}
