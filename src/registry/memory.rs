use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{BucketChangeRequest, RegistryError, Speaker, SpeakerRegistry};

/// In-process registry for local runs and tests.
///
/// Accepted bucket changes are applied immediately and kept in submission order.
#[derive(Debug, Default)]
pub struct MemorySpeakerRegistry {
    speakers: RwLock<HashMap<String, Speaker>>,
    changes: RwLock<Vec<BucketChangeRequest>>,
}

impl MemorySpeakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_speakers(speakers: impl IntoIterator<Item = Speaker>) -> Self {
        let registry = Self::new();
        for speaker in speakers {
            registry.upsert(speaker);
        }
        registry
    }

    pub fn upsert(&self, speaker: Speaker) {
        self.speakers.write().insert(speaker.id.clone(), speaker);
    }

    /// Bucket changes received so far.
    pub fn changes(&self) -> Vec<BucketChangeRequest> {
        self.changes.read().clone()
    }
}

#[async_trait]
impl SpeakerRegistry for MemorySpeakerRegistry {
    async fn get_speaker(&self, id: &str) -> Result<Option<Speaker>, RegistryError> {
        Ok(self.speakers.read().get(id).cloned())
    }

    async fn propose_bucket_change(
        &self,
        change: BucketChangeRequest,
    ) -> Result<(), RegistryError> {
        {
            let mut speakers = self.speakers.write();
            let speaker = speakers.get_mut(&change.speaker_id).ok_or_else(|| {
                RegistryError::SpeakerNotFound {
                    speaker_id: change.speaker_id.clone(),
                }
            })?;
            speaker.bucket = change.to_bucket;
        }
        self.changes.write().push(change);
        Ok(())
    }
}
