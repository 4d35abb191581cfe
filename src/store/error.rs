use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Another writer already published this vector version.
    #[error("correction vector version {version} for speaker '{speaker_id}' already exists")]
    VersionConflict { speaker_id: String, version: u64 },

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// The record already reached a terminal state.
    #[error("{kind} '{id}' is already finalized")]
    AlreadyFinalized { kind: &'static str, id: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage task failed: {0}")]
    TaskFailed(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::VersionConflict { .. } | StoreError::Io(_) | StoreError::TaskFailed(_)
        )
    }
}
