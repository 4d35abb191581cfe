//! Text embeddings.
//!
//! - [`TextEmbedder`] is the seam used by vector building, cold-start retrieval and
//!   evaluation similarity.
//! - [`HashingEmbedder`] is the default: deterministic feature hashing, so rebuilding
//!   a correction vector or re-scoring a note reproduces the same numbers.

mod error;
pub mod hashing;

pub use error::EmbeddingError;
pub use hashing::HashingEmbedder;

use half::f16;

/// Produces unit-length embeddings.
pub trait TextEmbedder: Send + Sync {
    /// Identifier recorded on every vector built with this embedder.
    fn model_id(&self) -> &str;

    /// Output dimension.
    fn dim(&self) -> usize;

    /// Embeds `text`. Text with no features yields an all-zero vector.
    fn embed(&self, text: &str) -> Result<Vec<f16>, EmbeddingError>;
}

/// Widens an f16 embedding for arithmetic or the vector index.
pub fn to_f32(embedding: &[f16]) -> Vec<f32> {
    embedding.iter().map(|v| v.to_f32()).collect()
}

/// Cosine similarity in `[-1, 1]`; `0.0` for mismatched lengths or zero vectors.
///
/// Computed in f64 as `dot / sqrt(|a|² · |b|²)` so identical inputs give exactly `1.0`.
pub fn cosine_similarity(a: &[f16], b: &[f16]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x.to_f32()), f64::from(y.to_f32()));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b).sqrt()).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(values: &[f32]) -> Vec<f16> {
        values.iter().copied().map(f16::from_f32).collect()
    }

    #[test]
    fn test_cosine_identical_is_exactly_one() {
        let a = v(&[0.3, -0.2, 0.9, 0.1]);
        assert_eq!(cosine_similarity(&a, &a), 1.0);
    }

    #[test]
    fn test_cosine_orthogonal_and_opposite() {
        assert_eq!(cosine_similarity(&v(&[1.0, 0.0]), &v(&[0.0, 1.0])), 0.0);
        assert_eq!(cosine_similarity(&v(&[1.0, 0.0]), &v(&[-1.0, 0.0])), -1.0);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&v(&[1.0]), &v(&[1.0, 0.0])), 0.0);
        assert_eq!(cosine_similarity(&v(&[0.0, 0.0]), &v(&[1.0, 0.0])), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
