use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use super::error::BucketError;
use super::types::{Bucket, BucketProposal, BucketTransition, TransitionReason};
use crate::registry::{BucketChangeRequest, RegistryError, Speaker, SpeakerRegistry};
use crate::store::TransitionLog;

/// Applies bucket changes to the registry and records them in the transition log.
#[derive(Clone)]
pub struct BucketReassigner {
    registry: Arc<dyn SpeakerRegistry>,
    log: Arc<dyn TransitionLog>,
}

impl BucketReassigner {
    pub fn new(registry: Arc<dyn SpeakerRegistry>, log: Arc<dyn TransitionLog>) -> Self {
        Self { registry, log }
    }

    /// Applies an evaluation-driven proposal.
    ///
    /// The speaker must still be in `from_bucket`. A proposal whose evaluation already
    /// produced a transition returns that transition.
    #[instrument(skip(self, proposal), fields(speaker_id = %proposal.speaker_id, evaluation_id = %proposal.evaluation_id))]
    pub async fn apply_proposal(
        &self,
        proposal: &BucketProposal,
    ) -> Result<BucketTransition, BucketError> {
        let history = self.log.history(&proposal.speaker_id).await?;
        if let Some(existing) = history
            .iter()
            .rev()
            .find(|t| t.evaluation_id.as_deref() == Some(proposal.evaluation_id.as_str()))
        {
            return Ok(existing.clone());
        }

        let speaker = self.load_speaker(&proposal.speaker_id).await?;
        if speaker.bucket != proposal.from_bucket {
            return Err(BucketError::StaleProposal {
                speaker_id: speaker.id,
                expected: proposal.from_bucket,
                actual: speaker.bucket,
            });
        }

        self.transition(
            speaker,
            proposal.to_bucket,
            TransitionReason::Automatic,
            Some(proposal.evaluation_id.clone()),
            None,
        )
        .await
    }

    /// Manual override; no evaluation needed.
    #[instrument(skip(self, note))]
    pub async fn apply_override(
        &self,
        speaker_id: &str,
        to_bucket: Bucket,
        note: Option<String>,
    ) -> Result<BucketTransition, BucketError> {
        let speaker = self.load_speaker(speaker_id).await?;
        self.transition(speaker, to_bucket, TransitionReason::Manual, None, note)
            .await
    }

    pub async fn history(&self, speaker_id: &str) -> Result<Vec<BucketTransition>, BucketError> {
        Ok(self.log.history(speaker_id).await?)
    }

    async fn load_speaker(&self, speaker_id: &str) -> Result<Speaker, BucketError> {
        self.registry.get_speaker(speaker_id).await?.ok_or_else(|| {
            BucketError::Registry(RegistryError::SpeakerNotFound {
                speaker_id: speaker_id.to_string(),
            })
        })
    }

    async fn transition(
        &self,
        speaker: Speaker,
        to_bucket: Bucket,
        reason: TransitionReason,
        evaluation_id: Option<String>,
        note: Option<String>,
    ) -> Result<BucketTransition, BucketError> {
        if speaker.bucket == to_bucket {
            return Err(BucketError::NoChange {
                speaker_id: speaker.id,
                bucket: to_bucket,
            });
        }

        self.registry
            .propose_bucket_change(BucketChangeRequest {
                speaker_id: speaker.id.clone(),
                from_bucket: speaker.bucket,
                to_bucket,
                reason,
                evaluation_id: evaluation_id.clone(),
            })
            .await?;

        let transition = BucketTransition {
            speaker_id: speaker.id,
            previous_bucket: speaker.bucket,
            new_bucket: to_bucket,
            evaluation_id,
            reason,
            note,
            created_at: Utc::now(),
        };
        self.log.append(&transition).await?;

        info!(
            speaker_id = %transition.speaker_id,
            from = %transition.previous_bucket,
            to = %transition.new_bucket,
            reason = %transition.reason,
            "Bucket reassigned"
        );
        Ok(transition)
    }
}
