//! Historical draft store port.
//!
//! Drafts are immutable once ingested. The AD, LD and IFN of one dictation share a
//! `note_key`; [`pair_history`] joins candidates with their ground truth on it.

pub mod error;
pub mod http;
pub mod memory;
pub mod pairs;

pub use error::DraftStoreError;
pub use http::HttpDraftStore;
pub use memory::MemoryDraftStore;
pub use pairs::{DraftPair, pair_history};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Draft kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DraftType {
    /// Speech-recognition draft.
    #[serde(rename = "AD")]
    Asr,
    /// LLM-produced draft.
    #[serde(rename = "LD")]
    Llm,
    /// Ground-truth final note.
    #[serde(rename = "IFN")]
    FinalNote,
}

impl DraftType {
    pub const CANDIDATES: [DraftType; 2] = [DraftType::Asr, DraftType::Llm];
    pub const ALL: [DraftType; 3] = [DraftType::Asr, DraftType::Llm, DraftType::FinalNote];

    pub fn is_candidate(self) -> bool {
        !matches!(self, DraftType::FinalNote)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DraftType::Asr => "AD",
            DraftType::Llm => "LD",
            DraftType::FinalNote => "IFN",
        }
    }
}

impl std::fmt::Display for DraftType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable text unit owned by a speaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub id: String,
    pub speaker_id: String,
    pub note_key: String,
    pub draft_type: DraftType,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Drafts of the given types, ordered oldest to newest. With `limit`, only the
    /// newest `limit` drafts are returned (still oldest first).
    async fn get_drafts_for_speaker(
        &self,
        speaker_id: &str,
        types: &[DraftType],
        limit: Option<usize>,
    ) -> Result<Vec<Draft>, DraftStoreError>;

    /// Returns `Ok(None)` for an unknown draft.
    async fn get_draft(&self, draft_id: &str) -> Result<Option<Draft>, DraftStoreError>;
}

/// Orders drafts oldest first with ID as the tie-break.
pub(crate) fn sort_drafts(drafts: &mut [Draft]) {
    drafts.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
