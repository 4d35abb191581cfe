//! Speaker registry port.
//!
//! The registry owns speaker identity and the current bucket. The pipeline reads
//! speakers and submits bucket changes; it never creates or deletes speakers.

pub mod error;
pub mod http;
pub mod memory;

pub use error::RegistryError;
pub use http::HttpSpeakerRegistry;
pub use memory::MemorySpeakerRegistry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bucket::{Bucket, TransitionReason};

/// Speaker lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpeakerStatus {
    Onboarding,
    Active,
    Inactive,
}

/// Speaker identity and current bucket as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speaker {
    pub id: String,
    pub bucket: Bucket,
    pub status: SpeakerStatus,
}

impl Speaker {
    pub fn new(id: impl Into<String>, bucket: Bucket) -> Self {
        Self {
            id: id.into(),
            bucket,
            status: SpeakerStatus::Active,
        }
    }

    /// Inactive speakers are excluded from generation.
    pub fn is_servable(&self) -> bool {
        !matches!(self.status, SpeakerStatus::Inactive)
    }
}

/// A bucket change submitted to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketChangeRequest {
    pub speaker_id: String,
    pub from_bucket: Bucket,
    pub to_bucket: Bucket,
    pub reason: TransitionReason,
    pub evaluation_id: Option<String>,
}

#[async_trait]
pub trait SpeakerRegistry: Send + Sync {
    /// Returns `Ok(None)` for an unknown speaker.
    async fn get_speaker(&self, id: &str) -> Result<Option<Speaker>, RegistryError>;

    /// Submits a bucket change; `Ok(())` is the registry's acknowledgement.
    async fn propose_bucket_change(&self, change: BucketChangeRequest)
    -> Result<(), RegistryError>;
}
