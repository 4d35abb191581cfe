//! Deterministic prompt assembly.
//!
//! The same source draft, rules and examples always render to the same bytes, so the
//! prompt digest on a DFN identifies exactly what the backend saw.

use std::fmt::Write;

use crate::constants::{CHARS_PER_TOKEN, PROMPT_OVERHEAD_TOKENS, RULE_LINE_TOKEN_ESTIMATE};
use crate::vector::{CorrectionRule, PairRef};

pub const DEFAULT_INSTRUCTIONS: &str = "You are editing a dictated clinical note. Rewrite the \
draft below into the speaker's final note. Apply the speaker's correction rules wherever their \
source text appears, fix recognition errors, and keep every clinical fact. Do not add content \
that is not in the draft. Reply with the corrected note text only.";

pub(crate) const INSTRUCTIONS_HEADER: &str = "### Instructions";
pub(crate) const RULES_HEADER: &str = "### Speaker correction rules";
pub(crate) const EXAMPLES_HEADER: &str = "### Examples";
pub(crate) const DRAFT_HEADER: &str = "### Draft to correct";
pub(crate) const OUTPUT_HEADER: &str = "### Final note";

/// A historical (draft, final note) pair shown to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FewShotExample {
    pub pair: PairRef,
    pub draft_text: String,
    pub final_text: String,
}

impl FewShotExample {
    /// Builds an example with both texts cut to `max_chars` characters.
    pub fn truncated(pair: PairRef, draft_text: &str, final_text: &str, max_chars: usize) -> Self {
        Self {
            pair,
            draft_text: truncate_chars(draft_text, max_chars),
            final_text: truncate_chars(final_text, max_chars),
        }
    }
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

pub struct PromptParts<'a> {
    pub source_text: &'a str,
    pub rules: &'a [&'a CorrectionRule],
    pub examples: &'a [FewShotExample],
    /// Replaces the instruction block only.
    pub instructions: Option<&'a str>,
}

pub fn assemble_prompt(parts: &PromptParts<'_>) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "{INSTRUCTIONS_HEADER}");
    let _ = writeln!(
        out,
        "{}\n",
        parts.instructions.unwrap_or(DEFAULT_INSTRUCTIONS).trim()
    );

    let _ = writeln!(out, "{RULES_HEADER}");
    if parts.rules.is_empty() {
        let _ = writeln!(out, "(none)");
    }
    for rule in parts.rules {
        let _ = writeln!(
            out,
            "- \"{}\" -> \"{}\" (confidence {:.2}, seen {}x)",
            rule.source, rule.target, rule.confidence, rule.frequency
        );
    }
    out.push('\n');

    if !parts.examples.is_empty() {
        let _ = writeln!(out, "{EXAMPLES_HEADER}");
        for (i, example) in parts.examples.iter().enumerate() {
            let _ = writeln!(
                out,
                "Example {}\nDraft:\n{}\nFinal:\n{}\n",
                i + 1,
                example.draft_text.trim(),
                example.final_text.trim()
            );
        }
    }

    let _ = writeln!(out, "{DRAFT_HEADER}");
    let _ = writeln!(out, "{}\n", parts.source_text.trim());
    let _ = writeln!(out, "{OUTPUT_HEADER}");
    out
}

/// Rough token count for budget checks.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Upper bound on prompt tokens excluding the source draft.
pub fn worst_case_context_tokens(
    max_rules: usize,
    few_shot_window: usize,
    few_shot_max_chars: usize,
) -> usize {
    PROMPT_OVERHEAD_TOKENS
        + max_rules * RULE_LINE_TOKEN_ESTIMATE
        + few_shot_window * 2 * few_shot_max_chars.div_ceil(CHARS_PER_TOKEN)
}
