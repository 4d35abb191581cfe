use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::error::EvaluationError;
use super::metrics::{QualityWeights, edit_rates, semantic_similarity};
use super::model::{Evaluation, EvaluationScores};
use crate::bucket::BucketBands;
use crate::drafts::{Draft, DraftStore, DraftType};
use crate::embedding::TextEmbedder;
use crate::events::{DomainEvent, EventEnvelope, EventPublisher};
use crate::hashing::evaluation_id;
use crate::rag::DraftGenieNote;
use crate::registry::SpeakerRegistry;
use crate::store::{EvaluationStore, InsertOutcome, NoteStore, StoreError};
use crate::text::NormalizationPolicy;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EvaluationConfig {
    pub weights: QualityWeights,
    pub bands: BucketBands,
}

/// Scores generated notes against ground truth and proposes bucket changes.
#[derive(Clone)]
pub struct EvaluationEngine {
    config: EvaluationConfig,
    policy: NormalizationPolicy,
    registry: Arc<dyn SpeakerRegistry>,
    drafts: Arc<dyn DraftStore>,
    notes: Arc<dyn NoteStore>,
    evaluations: Arc<dyn EvaluationStore>,
    embedder: Arc<dyn TextEmbedder>,
    publisher: Arc<dyn EventPublisher>,
}

impl EvaluationEngine {
    pub fn new(
        config: EvaluationConfig,
        registry: Arc<dyn SpeakerRegistry>,
        drafts: Arc<dyn DraftStore>,
        notes: Arc<dyn NoteStore>,
        evaluations: Arc<dyn EvaluationStore>,
        embedder: Arc<dyn TextEmbedder>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            config,
            policy: NormalizationPolicy::case_folded(),
            registry,
            drafts,
            notes,
            evaluations,
            embedder,
            publisher,
        }
    }

    pub fn config(&self) -> EvaluationConfig {
        self.config
    }

    /// Evaluates a DFN against its ground-truth note.
    ///
    /// A stored terminal evaluation is returned as-is. An evaluation left
    /// `InProgress` by an interrupted run is recomputed; the scores are deterministic.
    #[instrument(skip(self))]
    pub async fn evaluate(&self, dfn_id: &str) -> Result<Evaluation, EvaluationError> {
        let id = evaluation_id(dfn_id);
        if let Some(existing) = self.evaluations.get(&id).await?
            && existing.status.is_terminal()
        {
            debug!(evaluation_id = %id, "Evaluation already finished");
            return Ok(existing);
        }

        let note = self
            .notes
            .get(dfn_id)
            .await?
            .ok_or_else(|| EvaluationError::UnknownDfn {
                dfn_id: dfn_id.to_string(),
            })?;
        let ground_truth = self.ground_truth(&note).await?;
        let speaker = self
            .registry
            .get_speaker(&note.speaker_id)
            .await?
            .ok_or_else(|| EvaluationError::UnknownSpeaker {
                speaker_id: note.speaker_id.clone(),
            })?;

        let mut pending = Evaluation::in_progress(id, note.id.clone(), note.speaker_id.clone());
        pending.ground_truth_id = Some(ground_truth.id.clone());
        let mut pending = match self.evaluations.insert_pending(&pending).await? {
            InsertOutcome::Existing(existing) if existing.status.is_terminal() => {
                return Ok(existing);
            }
            outcome => outcome.into_inner(),
        };
        pending.ground_truth_id = Some(ground_truth.id.clone());

        let evaluation = match self.score(&note, &ground_truth) {
            Ok(scores) => pending.into_completed(scores, speaker.bucket),
            Err(reason) => pending.into_failed(reason),
        };

        match self.evaluations.finalize(&evaluation).await {
            Ok(()) => {}
            Err(StoreError::AlreadyFinalized { .. }) => {
                // A concurrent run finished first; its record wins.
                if let Some(stored) = self.evaluations.get(&evaluation.id).await? {
                    return Ok(stored);
                }
            }
            Err(e) => return Err(e.into()),
        }

        self.log_outcome(&evaluation);
        self.publish(&evaluation).await;
        Ok(evaluation)
    }

    /// Most recent IFN sharing the DFN's note key.
    async fn ground_truth(&self, note: &DraftGenieNote) -> Result<Draft, EvaluationError> {
        let finals = self
            .drafts
            .get_drafts_for_speaker(&note.speaker_id, &[DraftType::FinalNote], None)
            .await?;
        finals
            .into_iter()
            .rev()
            .find(|d| d.note_key == note.note_key)
            .ok_or_else(|| EvaluationError::GroundTruthUnavailable {
                dfn_id: note.id.clone(),
            })
    }

    /// `Err` carries the failure reason stored on the evaluation.
    fn score(
        &self,
        note: &DraftGenieNote,
        ground_truth: &Draft,
    ) -> Result<EvaluationScores, String> {
        let generated = match (&note.generated_text, note.is_generated()) {
            (Some(text), true) => text,
            _ => return Err(format!("DFN status is {:?}, not GENERATED", note.status)),
        };

        let rates = edit_rates(generated, &ground_truth.text, self.policy)
            .map_err(|e| format!("alignment failed: {e}"))?;
        let similarity = semantic_similarity(
            self.embedder.as_ref(),
            generated,
            &ground_truth.text,
            self.policy,
        )
        .map_err(|e| format!("similarity failed: {e}"))?;

        let quality_score = self
            .config
            .weights
            .quality_score(rates.ser, rates.wer, similarity);

        Ok(EvaluationScores {
            ser: rates.ser,
            wer: rates.wer,
            similarity,
            quality_score,
            recommended_bucket: self.config.bands.classify(quality_score),
            counts: rates.counts,
        })
    }

    fn log_outcome(&self, evaluation: &Evaluation) {
        match (&evaluation.scores, &evaluation.failure_reason) {
            (Some(scores), _) => info!(
                evaluation_id = %evaluation.id,
                dfn_id = %evaluation.dfn_id,
                speaker_id = %evaluation.speaker_id,
                ser = scores.ser,
                wer = scores.wer,
                similarity = scores.similarity,
                quality_score = scores.quality_score,
                recommended_bucket = %scores.recommended_bucket,
                "Evaluation completed"
            ),
            (None, Some(reason)) => warn!(
                evaluation_id = %evaluation.id,
                dfn_id = %evaluation.dfn_id,
                reason = %reason,
                "Evaluation failed"
            ),
            (None, None) => {}
        }
    }

    async fn publish(&self, evaluation: &Evaluation) {
        let Some(scores) = &evaluation.scores else {
            return;
        };

        let completed = EventEnvelope::new(DomainEvent::EvaluationCompleted {
            evaluation_id: evaluation.id.clone(),
            dfn_id: evaluation.dfn_id.clone(),
            quality_score: scores.quality_score,
            recommended_bucket: scores.recommended_bucket,
        });
        if let Err(e) = self.publisher.publish(completed).await {
            warn!(
                evaluation_id = %evaluation.id,
                error = %e,
                "Failed to publish evaluation.completed"
            );
        }

        if let Some(proposal) = evaluation.proposal() {
            info!(
                speaker_id = %proposal.speaker_id,
                from = %proposal.from_bucket,
                to = %proposal.to_bucket,
                "Proposing bucket reassignment"
            );
            let event = EventEnvelope::new(DomainEvent::BucketReassignmentProposed {
                speaker_id: proposal.speaker_id,
                from_bucket: proposal.from_bucket,
                to_bucket: proposal.to_bucket,
                evaluation_id: proposal.evaluation_id,
            });
            if let Err(e) = self.publisher.publish(event).await {
                warn!(
                    evaluation_id = %evaluation.id,
                    error = %e,
                    "Failed to publish bucket_reassignment.proposed"
                );
            }
        }
    }
}
