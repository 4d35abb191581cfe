use thiserror::Error;

use super::types::Bucket;
use crate::registry::RegistryError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum BucketError {
    #[error("unknown bucket '{value}'")]
    UnknownBucket { value: String },

    #[error("invalid bucket bands: {reason}")]
    InvalidBands { reason: String },

    /// The speaker's bucket moved since the proposal was made.
    #[error("stale proposal for speaker '{speaker_id}': expected bucket {expected}, found {actual}")]
    StaleProposal {
        speaker_id: String,
        expected: Bucket,
        actual: Bucket,
    },

    #[error("speaker '{speaker_id}' is already in bucket {bucket}")]
    NoChange { speaker_id: String, bucket: Bucket },

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
