use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry request to '{url}' failed: {message}")]
    RequestFailed { url: String, message: String },

    #[error("registry rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid registry response: {0}")]
    InvalidResponse(String),

    #[error("speaker not found: {speaker_id}")]
    SpeakerNotFound { speaker_id: String },
}

impl RegistryError {
    pub fn is_retryable(&self) -> bool {
        match self {
            RegistryError::RequestFailed { .. } => true,
            RegistryError::Rejected { status, .. } => *status == 429 || *status >= 500,
            RegistryError::InvalidResponse(_) | RegistryError::SpeakerNotFound { .. } => false,
        }
    }
}
