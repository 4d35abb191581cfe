use std::time::Duration;

use thiserror::Error;

use super::model::FailureKind;
use crate::drafts::{DraftStoreError, DraftType};
use crate::embedding::EmbeddingError;
use crate::registry::RegistryError;
use crate::store::StoreError;
use crate::vectordb::VectorDbError;

/// Failure reported by a [`super::GenerativeBackend`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend rate limited: {message}")]
    RateLimited { message: String },

    #[error("backend call timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("backend rejected request: {message}")]
    InvalidRequest { message: String },

    #[error("malformed backend response: {message}")]
    MalformedResponse { message: String },

    #[error("backend unavailable: {message}")]
    Unavailable { message: String },
}

impl BackendError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendError::RateLimited { .. }
                | BackendError::Timeout { .. }
                | BackendError::Unavailable { .. }
        )
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            BackendError::RateLimited { .. } => FailureKind::RateLimited,
            BackendError::Timeout { .. } => FailureKind::Timeout,
            BackendError::InvalidRequest { .. } => FailureKind::InvalidRequest,
            BackendError::MalformedResponse { .. } => FailureKind::MalformedResponse,
            BackendError::Unavailable { .. } => FailureKind::Internal,
        }
    }
}

/// Reasons a generation request produced no DFN record.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("unknown speaker '{speaker_id}'")]
    UnknownSpeaker { speaker_id: String },

    #[error("speaker '{speaker_id}' is inactive")]
    InactiveSpeaker { speaker_id: String },

    #[error("unknown draft '{draft_id}'")]
    UnknownDraft { draft_id: String },

    #[error("draft '{draft_id}' belongs to speaker '{owner}', not '{speaker_id}'")]
    DraftSpeakerMismatch {
        draft_id: String,
        speaker_id: String,
        owner: String,
    },

    #[error("draft '{draft_id}' is a {draft_type} draft; only AD/LD drafts can be corrected")]
    NotACandidate {
        draft_id: String,
        draft_type: DraftType,
    },

    #[error("draft '{draft_id}' has no text")]
    EmptyDraft { draft_id: String },

    /// Neither the speaker nor any other speaker has a usable vector.
    #[error("no correction vector available for speaker '{speaker_id}'")]
    NoCorrectionVector { speaker_id: String },

    /// Every probed attempt ordinal for the draft was already taken.
    #[error("no free attempt slot for draft '{source_draft_id}' after {probes} probes")]
    AttemptsExhausted {
        source_draft_id: String,
        probes: usize,
    },

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("draft store error: {0}")]
    Drafts(#[from] DraftStoreError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("vector index error: {0}")]
    VectorIndex(#[from] VectorDbError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

impl RagError {
    pub fn is_retryable(&self) -> bool {
        match self {
            RagError::Registry(e) => e.is_retryable(),
            RagError::Drafts(e) => e.is_retryable(),
            RagError::Store(e) => e.is_retryable(),
            RagError::VectorIndex(e) => e.is_retryable(),
            _ => false,
        }
    }
}
