//! Tokenization and sentence splitting.

use serde::{Deserialize, Serialize};

/// Fixed normalization applied identically to both sides of an alignment.
///
/// Tokens are split on whitespace, leading/trailing punctuation is stripped (internal
/// apostrophes and hyphens survive, so `don't` and `follow-up` stay whole), and tokens
/// left empty are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationPolicy {
    /// Lowercase every token.
    pub case_fold: bool,
}

impl Default for NormalizationPolicy {
    fn default() -> Self {
        Self::case_folded()
    }
}

impl NormalizationPolicy {
    /// Policy used for scoring: capitalization differences are not edits.
    pub const fn case_folded() -> Self {
        Self { case_fold: true }
    }

    /// Policy used for correction extraction: capitalization fixes are real rules.
    pub const fn case_preserving() -> Self {
        Self { case_fold: false }
    }

    /// Tokenizes `text` into normalized word tokens.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.split_whitespace()
            .filter_map(|raw| normalize_token(raw, self.case_fold))
            .collect()
    }

    /// Tokenizes `text`, tagging each token with the sentence it belongs to.
    pub fn tokenize_sentences(&self, text: &str) -> SentenceTokens {
        let mut tokens = Vec::new();
        let mut sentence_of = Vec::new();
        let mut sentence_count = 0;

        for sentence in split_sentences(text) {
            let before = tokens.len();
            tokens.extend(self.tokenize(sentence));
            if tokens.len() > before {
                sentence_of.resize(tokens.len(), sentence_count);
                sentence_count += 1;
            }
        }

        SentenceTokens {
            tokens,
            sentence_of,
            sentence_count,
        }
    }
}

/// Tokens plus the sentence index of each token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentenceTokens {
    pub tokens: Vec<String>,
    pub sentence_of: Vec<usize>,
    pub sentence_count: usize,
}

/// Strips surrounding punctuation from a raw whitespace-delimited token.
///
/// Returns `None` when nothing alphanumeric remains.
pub fn normalize_token(raw: &str, case_fold: bool) -> Option<String> {
    let trimmed = raw.trim_matches(|c: char| !c.is_alphanumeric());
    if trimmed.is_empty() {
        return None;
    }

    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '\'' | '-' | '’'))
        .collect();

    if case_fold {
        Some(cleaned.to_lowercase())
    } else {
        Some(cleaned)
    }
}

/// Splits text into sentences at `.`, `!`, `?` and line breaks.
///
/// Terminators stay attached to the preceding sentence; blank sentences are skipped.
/// A period between two digits (`2.5`) does not end a sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();

    for (idx, ch) in text.char_indices() {
        let boundary = match ch {
            '!' | '?' | '\n' | '\r' => true,
            '.' => {
                let prev_digit = idx > 0 && bytes[idx - 1].is_ascii_digit();
                let next_digit = bytes.get(idx + 1).is_some_and(|b| b.is_ascii_digit());
                !(prev_digit && next_digit)
            }
            _ => false,
        };

        if boundary {
            let end = idx + ch.len_utf8();
            let sentence = text[start..end].trim();
            if sentence.chars().any(char::is_alphanumeric) {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    let tail = text[start..].trim();
    if tail.chars().any(char::is_alphanumeric) {
        sentences.push(tail);
    }

    sentences
}
