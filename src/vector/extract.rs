//! Rule extraction from aligned draft/final-note pairs.

use std::collections::HashMap;

use super::model::CorrectionRule;
use crate::text::{AlignedText, EditOp};

fn push_run(
    aligned: &AlignedText,
    run: &mut Vec<(usize, usize)>,
    max_ngram: usize,
    out: &mut Vec<(String, String)>,
) {
    if run.is_empty() {
        return;
    }
    if run.len() <= max_ngram {
        let source = run
            .iter()
            .map(|&(s, _)| aligned.source_tokens[s].as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let target = run
            .iter()
            .map(|&(_, t)| aligned.target_tokens[t].as_str())
            .collect::<Vec<_>>()
            .join(" ");
        out.push((source, target));
    } else {
        for &(s, t) in run.iter() {
            out.push((
                aligned.source_tokens[s].clone(),
                aligned.target_tokens[t].clone(),
            ));
        }
    }
    run.clear();
}

/// `(source, target)` for each maximal run of consecutive substitutions.
///
/// Runs longer than `max_ngram` are split into unigram rules.
fn substitution_runs(aligned: &AlignedText, max_ngram: usize) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut run = Vec::new();

    for op in aligned.alignment.ops() {
        match *op {
            EditOp::Substitute { source, target } => run.push((source, target)),
            _ => push_run(aligned, &mut run, max_ngram, &mut out),
        }
    }
    push_run(aligned, &mut run, max_ngram, &mut out);
    out
}

/// Counts every n-gram (n ≤ `max_ngram`) of every draft, space-joined.
fn ngram_counts<'a>(
    drafts: impl Iterator<Item = &'a [String]>,
    max_ngram: usize,
) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for tokens in drafts {
        for n in 1..=max_ngram.max(1) {
            for window in tokens.windows(n) {
                *counts.entry(window.join(" ")).or_insert(0) += 1;
            }
        }
    }
    counts
}

/// Builds the ordered rule list for a set of aligned pairs.
///
/// Only rules seen at least `min_frequency` times survive. Conflicting targets for one
/// source are all kept.
pub fn extract_rules(
    aligned: &[AlignedText],
    min_frequency: u32,
    max_ngram: usize,
) -> Vec<CorrectionRule> {
    let mut frequencies: HashMap<(String, String), u32> = HashMap::new();
    for pair in aligned {
        for key in substitution_runs(pair, max_ngram) {
            *frequencies.entry(key).or_insert(0) += 1;
        }
    }

    let occurrences = ngram_counts(
        aligned.iter().map(|a| a.source_tokens.as_slice()),
        max_ngram,
    );

    let mut rules: Vec<CorrectionRule> = frequencies
        .into_iter()
        .filter(|(_, frequency)| *frequency >= min_frequency)
        .map(|((source, target), frequency)| {
            let seen = occurrences.get(&source).copied().unwrap_or(0).max(frequency);
            CorrectionRule {
                confidence: (f64::from(frequency) / f64::from(seen)).min(1.0),
                source,
                target,
                frequency,
            }
        })
        .collect();

    rules.sort_by(|a, b| a.priority_cmp(b));
    rules
}
