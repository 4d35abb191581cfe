use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorDbError {
    #[error("failed to connect to Qdrant at '{url}': {message}")]
    ConnectionFailed { url: String, message: String },

    #[error("failed to create collection '{collection}': {message}")]
    CreateCollectionFailed { collection: String, message: String },

    #[error("collection not found: {collection}")]
    CollectionNotFound { collection: String },

    #[error("failed to upsert points to '{collection}': {message}")]
    UpsertFailed { collection: String, message: String },

    #[error("failed to search in '{collection}': {message}")]
    SearchFailed { collection: String, message: String },

    #[error("invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },
}

impl VectorDbError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VectorDbError::ConnectionFailed { .. }
                | VectorDbError::UpsertFailed { .. }
                | VectorDbError::SearchFailed { .. }
        )
    }
}
