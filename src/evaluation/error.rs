use thiserror::Error;

use crate::drafts::DraftStoreError;
use crate::embedding::EmbeddingError;
use crate::registry::RegistryError;
use crate::store::StoreError;

/// Reasons an evaluation request produced no record.
///
/// Failures after the record exists (a non-generated DFN, an unalignable pair) are
/// stored as FAILED evaluations instead.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// No ground-truth note for the DFN yet; expected until the IFN is ingested.
    #[error("no ground truth available for DFN '{dfn_id}'")]
    GroundTruthUnavailable { dfn_id: String },

    #[error("unknown DFN '{dfn_id}'")]
    UnknownDfn { dfn_id: String },

    #[error("unknown speaker '{speaker_id}'")]
    UnknownSpeaker { speaker_id: String },

    #[error("invalid quality weights: {reason}")]
    InvalidWeights { reason: String },

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("draft store error: {0}")]
    Drafts(#[from] DraftStoreError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

impl EvaluationError {
    pub fn is_retryable(&self) -> bool {
        match self {
            EvaluationError::Registry(e) => e.is_retryable(),
            EvaluationError::Drafts(e) => e.is_retryable(),
            EvaluationError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}
