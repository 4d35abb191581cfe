use thiserror::Error;

#[derive(Debug, Error)]
pub enum DraftStoreError {
    #[error("draft store request to '{url}' failed: {message}")]
    RequestFailed { url: String, message: String },

    #[error("draft store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid draft store response: {0}")]
    InvalidResponse(String),
}

impl DraftStoreError {
    pub fn is_retryable(&self) -> bool {
        match self {
            DraftStoreError::RequestFailed { .. } => true,
            DraftStoreError::Rejected { status, .. } => *status == 429 || *status >= 500,
            DraftStoreError::InvalidResponse(_) => false,
        }
    }
}
