use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bucket::Bucket;
use crate::drafts::DraftType;
use crate::rag::NoteStatus;

/// Topic names as they appear on the wire.
pub mod topics {
    pub const SPEAKER_HISTORY_UPDATED: &str = "speaker.history_updated";
    pub const DRAFT_INGESTED: &str = "draft.ingested";
    pub const CORRECTION_VECTOR_UPDATED: &str = "correction_vector.updated";
    pub const DFN_GENERATED: &str = "dfn.generated";
    pub const EVALUATION_COMPLETED: &str = "evaluation.completed";
    pub const BUCKET_REASSIGNMENT_PROPOSED: &str = "bucket_reassignment.proposed";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "payload")]
pub enum DomainEvent {
    #[serde(rename = "speaker.history_updated")]
    SpeakerHistoryUpdated { speaker_id: String },

    #[serde(rename = "draft.ingested")]
    DraftIngested {
        speaker_id: String,
        draft_id: String,
        draft_type: DraftType,
        note_key: String,
    },

    #[serde(rename = "correction_vector.updated")]
    CorrectionVectorUpdated { speaker_id: String, version: u64 },

    #[serde(rename = "dfn.generated")]
    DfnGenerated {
        dfn_id: String,
        speaker_id: String,
        status: NoteStatus,
    },

    #[serde(rename = "evaluation.completed")]
    EvaluationCompleted {
        evaluation_id: String,
        dfn_id: String,
        quality_score: f64,
        recommended_bucket: Bucket,
    },

    #[serde(rename = "bucket_reassignment.proposed")]
    BucketReassignmentProposed {
        speaker_id: String,
        from_bucket: Bucket,
        to_bucket: Bucket,
        evaluation_id: String,
    },
}

impl DomainEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            DomainEvent::SpeakerHistoryUpdated { .. } => topics::SPEAKER_HISTORY_UPDATED,
            DomainEvent::DraftIngested { .. } => topics::DRAFT_INGESTED,
            DomainEvent::CorrectionVectorUpdated { .. } => topics::CORRECTION_VECTOR_UPDATED,
            DomainEvent::DfnGenerated { .. } => topics::DFN_GENERATED,
            DomainEvent::EvaluationCompleted { .. } => topics::EVALUATION_COMPLETED,
            DomainEvent::BucketReassignmentProposed { .. } => topics::BUCKET_REASSIGNMENT_PROPOSED,
        }
    }

    /// Speaker the event concerns, when it names one.
    pub fn speaker_id(&self) -> Option<&str> {
        match self {
            DomainEvent::SpeakerHistoryUpdated { speaker_id }
            | DomainEvent::DraftIngested { speaker_id, .. }
            | DomainEvent::CorrectionVectorUpdated { speaker_id, .. }
            | DomainEvent::DfnGenerated { speaker_id, .. }
            | DomainEvent::BucketReassignmentProposed { speaker_id, .. } => Some(speaker_id),
            DomainEvent::EvaluationCompleted { .. } => None,
        }
    }
}

/// Event plus delivery metadata.
///
/// `event_id` is stable across redeliveries of the same event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: String,
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
    pub event: DomainEvent,
}

impl EventEnvelope {
    /// Wraps a freshly produced event with a new random ID.
    pub fn new(event: DomainEvent) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            occurred_at: Utc::now(),
            event,
        }
    }

    pub fn with_id(event_id: impl Into<String>, event: DomainEvent) -> Self {
        Self {
            event_id: event_id.into(),
            occurred_at: Utc::now(),
            event,
        }
    }

    pub fn topic(&self) -> &'static str {
        self.event.topic()
    }
}
