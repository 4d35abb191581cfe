use thiserror::Error;

use crate::drafts::DraftStoreError;
use crate::embedding::EmbeddingError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum VectorBuildError {
    /// No usable (draft, final note) pair.
    #[error("insufficient history for speaker '{speaker_id}': no alignable draft pairs")]
    InsufficientHistory { speaker_id: String },

    #[error("pair '{pair_key}' belongs to speaker '{owner}', not '{speaker_id}'")]
    ForeignPair {
        speaker_id: String,
        owner: String,
        pair_key: String,
    },

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("draft store error: {0}")]
    Drafts(#[from] DraftStoreError),
}

impl VectorBuildError {
    /// Version conflicts and transient I/O are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            VectorBuildError::Store(e) => e.is_retryable(),
            VectorBuildError::Drafts(e) => e.is_retryable(),
            _ => false,
        }
    }
}
