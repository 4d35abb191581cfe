use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bucket::{Bucket, BucketProposal};

/// `Pending → InProgress → Completed | Failed`. Both end states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl EvaluationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, EvaluationStatus::Completed | EvaluationStatus::Failed)
    }

    pub fn can_advance_to(self, next: EvaluationStatus) -> bool {
        use EvaluationStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress) | (Pending | InProgress, Completed | Failed)
        )
    }
}

/// Raw alignment counts behind the rates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditCounts {
    pub substitutions: usize,
    pub insertions: usize,
    pub deletions: usize,
    pub reference_words: usize,
    pub reference_sentences: usize,
    pub sentences_with_edits: usize,
}

impl EditCounts {
    pub fn edits(&self) -> usize {
        self.substitutions + self.insertions + self.deletions
    }
}

/// Scores for a completed evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationScores {
    pub ser: f64,
    pub wer: f64,
    /// Cosine similarity clamped to `[0, 1]`.
    pub similarity: f64,
    /// `0..=100`, two decimals.
    pub quality_score: f64,
    pub recommended_bucket: Bucket,
    pub counts: EditCounts,
}

/// Comparison of one DFN against its ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: String,
    pub dfn_id: String,
    pub speaker_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ground_truth_id: Option<String>,
    pub status: EvaluationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<EvaluationScores>,
    /// Speaker bucket when the evaluation ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_bucket: Option<Bucket>,
    pub reassignment_proposed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Evaluation {
    pub(crate) fn in_progress(id: String, dfn_id: String, speaker_id: String) -> Self {
        Self {
            id,
            dfn_id,
            speaker_id,
            ground_truth_id: None,
            status: EvaluationStatus::InProgress,
            scores: None,
            speaker_bucket: None,
            reassignment_proposed: false,
            failure_reason: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn quality_score(&self) -> Option<f64> {
        self.scores.as_ref().map(|s| s.quality_score)
    }

    pub fn recommended_bucket(&self) -> Option<Bucket> {
        self.scores.as_ref().map(|s| s.recommended_bucket)
    }

    /// The reassignment this evaluation recommends, if any.
    pub fn proposal(&self) -> Option<BucketProposal> {
        let from_bucket = self.speaker_bucket?;
        let to_bucket = self.recommended_bucket()?;
        (self.reassignment_proposed && from_bucket != to_bucket).then(|| BucketProposal {
            speaker_id: self.speaker_id.clone(),
            from_bucket,
            to_bucket,
            evaluation_id: self.id.clone(),
        })
    }

    pub(crate) fn into_completed(
        mut self,
        scores: EvaluationScores,
        speaker_bucket: Bucket,
    ) -> Self {
        self.reassignment_proposed = scores.recommended_bucket != speaker_bucket;
        self.status = EvaluationStatus::Completed;
        self.scores = Some(scores);
        self.speaker_bucket = Some(speaker_bucket);
        self.completed_at = Some(Utc::now());
        self
    }

    pub(crate) fn into_failed(mut self, reason: impl Into<String>) -> Self {
        self.status = EvaluationStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.completed_at = Some(Utc::now());
        self
    }
}
