use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hashing::prompt_digest;
use crate::vector::PairRef;

/// Persisted DFN status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteStatus {
    Pending,
    Generated,
    Failed,
}

impl NoteStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, NoteStatus::Pending)
    }
}

/// Request lifecycle: `Pending → Retrieving → Prompting → Generating → Generated | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStage {
    Pending,
    Retrieving,
    Prompting,
    Generating,
    Generated,
    Failed,
}

impl GenerationStage {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationStage::Pending => "PENDING",
            GenerationStage::Retrieving => "RETRIEVING",
            GenerationStage::Prompting => "PROMPTING",
            GenerationStage::Generating => "GENERATING",
            GenerationStage::Generated => "GENERATED",
            GenerationStage::Failed => "FAILED",
        }
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: GenerationStage) -> bool {
        use GenerationStage::*;
        matches!(
            (self, next),
            (Pending, Retrieving)
                | (Retrieving, Prompting)
                | (Prompting, Generating)
                | (Generating, Generated)
                | (Pending | Retrieving | Prompting | Generating, Failed)
        )
    }
}

/// Whether DFN records keep the full prompt or only its digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStorage {
    #[default]
    Full,
    Hash,
}

impl FromStr for PromptStorage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(PromptStorage::Full),
            "hash" => Ok(PromptStorage::Hash),
            other => Err(format!("expected 'full' or 'hash', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRecord {
    /// BLAKE3 hex digest; always present.
    pub digest: String,
    /// Present under [`PromptStorage::Full`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl PromptRecord {
    pub fn new(prompt: &str, storage: PromptStorage) -> Self {
        Self {
            digest: prompt_digest(prompt),
            text: match storage {
                PromptStorage::Full => Some(prompt.to_string()),
                PromptStorage::Hash => None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    RateLimited,
    Timeout,
    InvalidRequest,
    MalformedResponse,
    Cancelled,
    Internal,
}

impl FailureKind {
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            FailureKind::RateLimited | FailureKind::Timeout | FailureKind::Cancelled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationFailure {
    pub kind: FailureKind,
    pub retryable: bool,
    pub message: String,
    /// Stage that was running when the request failed.
    pub stage: GenerationStage,
}

impl GenerationFailure {
    pub fn new(kind: FailureKind, stage: GenerationStage, message: impl Into<String>) -> Self {
        Self {
            kind,
            retryable: kind.is_retryable(),
            message: message.into(),
            stage,
        }
    }
}

/// Vector reference used for cold start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorRef {
    pub speaker_id: String,
    pub version: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteProvenance {
    pub cold_start: bool,
    /// Vector borrowed from another speaker when `cold_start` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub borrowed_vector: Option<VectorRef>,
    pub few_shot_pairs: Vec<PairRef>,
    pub rule_count: usize,
}

/// Draft genie note: one generation attempt for a source draft.
///
/// Created `Pending` once preconditions pass; finalized exactly once to `Generated`
/// or `Failed`, after which it never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftGenieNote {
    pub id: String,
    pub speaker_id: String,
    pub source_draft_id: String,
    pub note_key: String,
    /// Version of the vector used; for cold start, the borrowed vector's version.
    pub vector_version: u64,
    pub attempt_key: String,
    pub status: NoteStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<PromptRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_text: Option<String>,
    pub provenance: NoteProvenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<GenerationFailure>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl DraftGenieNote {
    pub fn is_generated(&self) -> bool {
        self.status == NoteStatus::Generated
    }

    pub(crate) fn into_generated(mut self, prompt: PromptRecord, text: String) -> Self {
        self.status = NoteStatus::Generated;
        self.prompt = Some(prompt);
        self.generated_text = Some(text);
        self.completed_at = Some(Utc::now());
        self
    }

    pub(crate) fn into_failed(
        mut self,
        prompt: Option<PromptRecord>,
        failure: GenerationFailure,
    ) -> Self {
        self.status = NoteStatus::Failed;
        self.prompt = prompt;
        self.failure = Some(failure);
        self.completed_at = Some(Utc::now());
        self
    }
}
