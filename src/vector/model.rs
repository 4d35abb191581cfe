use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use half::f16;
use serde::{Deserialize, Serialize};

use crate::drafts::pairs::pair_key;

/// One learned substitution: `source` in a draft became `target` in the final note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionRule {
    pub source: String,
    pub target: String,
    pub frequency: u32,
    /// `frequency` over the source pattern's occurrences in the drafts, capped at 1.0.
    pub confidence: f64,
}

impl CorrectionRule {
    /// Rule priority: confidence desc, frequency desc, source asc, target asc.
    pub fn priority_cmp(&self, other: &Self) -> Ordering {
        other
            .confidence
            .total_cmp(&self.confidence)
            .then_with(|| other.frequency.cmp(&self.frequency))
            .then_with(|| self.source.cmp(&other.source))
            .then_with(|| self.target.cmp(&other.target))
    }
}

/// A (candidate draft, ground truth) pair that contributed to a vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairRef {
    pub draft_id: String,
    pub ground_truth_id: String,
}

impl PairRef {
    pub fn key(&self) -> String {
        pair_key(&self.draft_id, &self.ground_truth_id)
    }
}

/// A versioned correction profile for one speaker.
///
/// Versions start at 1. Every stored version is complete; the current vector is the
/// highest stored version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionVector {
    pub speaker_id: String,
    pub version: u64,
    /// Sorted by [`CorrectionRule::priority_cmp`].
    pub rules: Vec<CorrectionRule>,
    pub embedding: Vec<f16>,
    /// Sorted by pair key.
    pub provenance: Vec<PairRef>,
    pub min_frequency: u32,
    pub max_ngram: usize,
    pub fingerprint: String,
    pub model_id: String,
    pub created_at: DateTime<Utc>,
}

impl CorrectionVector {
    /// One rule per source pattern, in priority order.
    ///
    /// Conflicting candidates are kept on the vector; this picks the highest
    /// confidence, then frequency, then the lexicographically smallest target.
    pub fn resolved_rules(&self) -> Vec<&CorrectionRule> {
        let mut best: HashMap<&str, &CorrectionRule> = HashMap::new();
        for rule in &self.rules {
            best.entry(rule.source.as_str())
                .and_modify(|current| {
                    if rule.priority_cmp(current) == Ordering::Less {
                        *current = rule;
                    }
                })
                .or_insert(rule);
        }

        let mut resolved: Vec<&CorrectionRule> = best.into_values().collect();
        resolved.sort_by(|a, b| a.priority_cmp(b));
        resolved
    }

    /// Rule text fed to the embedder: one `source => target` line per rule.
    pub fn rule_text(rules: &[CorrectionRule]) -> String {
        rules
            .iter()
            .map(|r| format!("{} => {}", r.source, r.target))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
