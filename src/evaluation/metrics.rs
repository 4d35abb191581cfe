//! Edit-rate metrics and the composite quality score.

use serde::{Deserialize, Serialize};

use super::error::EvaluationError;
use super::model::EditCounts;
use crate::constants::{DEFAULT_WEIGHT_SER, DEFAULT_WEIGHT_SIMILARITY, DEFAULT_WEIGHT_WER};
use crate::embedding::{TextEmbedder, cosine_similarity};
use crate::text::{AlignmentError, EditOp, NormalizationPolicy, align_tokens};

/// Weights of the quality score components. Normalized by their sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    pub wer: f64,
    pub similarity: f64,
    pub ser: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            wer: DEFAULT_WEIGHT_WER,
            similarity: DEFAULT_WEIGHT_SIMILARITY,
            ser: DEFAULT_WEIGHT_SER,
        }
    }
}

impl QualityWeights {
    pub fn total(&self) -> f64 {
        self.wer + self.similarity + self.ser
    }

    /// Weights must be finite, non-negative and sum to more than zero.
    pub fn validate(&self) -> Result<(), EvaluationError> {
        let all = [self.wer, self.similarity, self.ser];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(EvaluationError::InvalidWeights {
                reason: "weights must be finite and non-negative".to_string(),
            });
        }
        if self.total() <= 0.0 {
            return Err(EvaluationError::InvalidWeights {
                reason: "weights must not all be zero".to_string(),
            });
        }
        Ok(())
    }

    /// Quality score in `0..=100`, rounded to two decimals.
    ///
    /// WER above 1 (more edits than reference words) counts as 1.
    pub fn quality_score(&self, ser: f64, wer: f64, similarity: f64) -> f64 {
        let total = self.total();
        if total <= 0.0 {
            return 0.0;
        }
        let weighted = self.wer * (1.0 - wer.clamp(0.0, 1.0))
            + self.similarity * similarity.clamp(0.0, 1.0)
            + self.ser * (1.0 - ser.clamp(0.0, 1.0));
        round2((100.0 * weighted / total).clamp(0.0, 100.0))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Edit counts and rates of a hypothesis against a reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditRates {
    pub counts: EditCounts,
    pub ser: f64,
    pub wer: f64,
}

/// Aligns `hypothesis` against `reference` and derives SER and WER.
///
/// Sentence attribution follows the reference: a substitution or an insertion counts
/// against the sentence of the reference token involved, a deletion (a hypothesis
/// token with no reference counterpart) against the sentence of the preceding
/// reference token, or the first sentence when there is none.
pub fn edit_rates(
    hypothesis: &str,
    reference: &str,
    policy: NormalizationPolicy,
) -> Result<EditRates, AlignmentError> {
    let hyp = policy.tokenize(hypothesis);
    let reference = policy.tokenize_sentences(reference);
    let alignment = align_tokens(&hyp, &reference.tokens)?;

    let mut edited = vec![false; reference.sentence_count];
    let mut last_reference: Option<usize> = None;
    for op in alignment.ops() {
        let sentence = match *op {
            EditOp::Match { target, .. } => {
                last_reference = Some(target);
                None
            }
            EditOp::Substitute { target, .. } | EditOp::Insert { target } => {
                last_reference = Some(target);
                Some(reference.sentence_of[target])
            }
            EditOp::Delete { .. } => Some(last_reference.map_or(0, |t| reference.sentence_of[t])),
        };
        if let Some(slot) = sentence.and_then(|s| edited.get_mut(s)) {
            *slot = true;
        }
    }

    let counts = EditCounts {
        substitutions: alignment.substitutions(),
        insertions: alignment.insertions(),
        deletions: alignment.deletions(),
        reference_words: reference.tokens.len(),
        reference_sentences: reference.sentence_count,
        sentences_with_edits: edited.iter().filter(|e| **e).count(),
    };

    Ok(EditRates {
        ser: ratio(counts.sentences_with_edits, counts.reference_sentences),
        wer: ratio(counts.edits(), counts.reference_words),
        counts,
    })
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Cosine similarity of the two texts' embeddings, clamped to `[0, 1]`.
///
/// Two texts without any tokens are identical by definition.
pub fn semantic_similarity(
    embedder: &dyn TextEmbedder,
    hypothesis: &str,
    reference: &str,
    policy: NormalizationPolicy,
) -> Result<f64, EvaluationError> {
    if policy.tokenize(hypothesis).is_empty() && policy.tokenize(reference).is_empty() {
        return Ok(1.0);
    }
    let a = embedder.embed(hypothesis)?;
    let b = embedder.embed(reference)?;
    Ok(cosine_similarity(&a, &b).clamp(0.0, 1.0))
}
