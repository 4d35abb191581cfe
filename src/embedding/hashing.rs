//! Feature-hashing embedder.
//!
//! Case-folded unigrams and adjacent bigrams are hashed with BLAKE3 into `dim` signed
//! buckets, then L2-normalized. No model files, no randomness.

use half::f16;
use tracing::trace;

use super::{EmbeddingError, TextEmbedder};
use crate::constants::{DEFAULT_EMBEDDING_DIM, HASHING_EMBEDDER_MODEL_ID};
use crate::text::NormalizationPolicy;

const UNIGRAM_WEIGHT: f32 = 1.0;
const BIGRAM_WEIGHT: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
    policy: NormalizationPolicy,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            dim: DEFAULT_EMBEDDING_DIM,
            policy: NormalizationPolicy::case_folded(),
        }
    }
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Result<Self, EmbeddingError> {
        if dim == 0 {
            return Err(EmbeddingError::InvalidConfig {
                reason: "embedding dimension must be positive".to_string(),
            });
        }
        Ok(Self {
            dim,
            ..Default::default()
        })
    }

    fn bucket(&self, feature: &str) -> (usize, f32) {
        let hash = blake3::hash(feature.as_bytes());
        let bytes = hash.as_bytes();
        let index = u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]) % self.dim as u64;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        (index as usize, sign)
    }
}

impl TextEmbedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        HASHING_EMBEDDER_MODEL_ID
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Vec<f16>, EmbeddingError> {
        let tokens = self.policy.tokenize(text);
        let mut acc = vec![0.0f32; self.dim];

        for token in &tokens {
            let (index, sign) = self.bucket(token);
            acc[index] += sign * UNIGRAM_WEIGHT;
        }
        for window in tokens.windows(2) {
            let feature = format!("{} {}", window[0], window[1]);
            let (index, sign) = self.bucket(&feature);
            acc[index] += sign * BIGRAM_WEIGHT;
        }

        trace!(
            token_count = tokens.len(),
            dim = self.dim,
            "Computed hashed embedding"
        );

        let norm: f32 = acc.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut acc {
                *x /= norm;
            }
        }

        Ok(acc.into_iter().map(f16::from_f32).collect())
    }
}
