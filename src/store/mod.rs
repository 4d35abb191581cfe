//! Record stores for pipeline outputs.
//!
//! - Correction vectors: append-only version log per speaker; current = highest version.
//! - DFNs and evaluations: insert-if-absent, then a single terminal write.
//! - Bucket transitions: append-only audit log.
//!
//! [`memory`] backs tests and local runs; [`fs`] writes one JSON document per record
//! through a temp file and an atomic rename.

pub mod error;
pub mod fs;
pub mod memory;


pub use error::StoreError;
pub use fs::{FsEvaluationStore, FsNoteStore, FsTransitionLog, FsVectorStore};
pub use memory::{MemoryEvaluationStore, MemoryNoteStore, MemoryTransitionLog, MemoryVectorStore};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::bucket::BucketTransition;
use crate::evaluation::Evaluation;
use crate::rag::DraftGenieNote;
use crate::vector::CorrectionVector;

/// Result of an insert-if-absent.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome<T> {
    Inserted(T),
    /// A record with the same ID was already stored; it is returned unchanged.
    Existing(T),
}

impl<T> InsertOutcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            InsertOutcome::Inserted(r) | InsertOutcome::Existing(r) => r,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

/// A record with a stable ID and a single terminal write.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: &'static str;

    fn id(&self) -> &str;
    fn speaker_id(&self) -> &str;
    fn is_terminal(&self) -> bool;
    fn created_at(&self) -> chrono::DateTime<chrono::Utc>;
}

impl Record for DraftGenieNote {
    const KIND: &'static str = "dfn";

    fn id(&self) -> &str {
        &self.id
    }

    fn speaker_id(&self) -> &str {
        &self.speaker_id
    }

    fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }
}

impl Record for Evaluation {
    const KIND: &'static str = "evaluation";

    fn id(&self) -> &str {
        &self.id
    }

    fn speaker_id(&self) -> &str {
        &self.speaker_id
    }

    fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }
}

#[async_trait]
pub trait CorrectionVectorStore: Send + Sync {
    /// Appends `vector` under its own version number.
    ///
    /// Fails with [`StoreError::VersionConflict`] if that version already exists.
    async fn append(&self, vector: &CorrectionVector) -> Result<(), StoreError>;

    /// Current vector: the highest stored version.
    async fn latest(&self, speaker_id: &str) -> Result<Option<CorrectionVector>, StoreError>;

    async fn get(
        &self,
        speaker_id: &str,
        version: u64,
    ) -> Result<Option<CorrectionVector>, StoreError>;

    /// Stored versions, ascending.
    async fn versions(&self, speaker_id: &str) -> Result<Vec<u64>, StoreError>;
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn insert_pending(
        &self,
        note: &DraftGenieNote,
    ) -> Result<InsertOutcome<DraftGenieNote>, StoreError>;

    /// Writes the terminal state. Rejects a second terminal write.
    async fn finalize(&self, note: &DraftGenieNote) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<DraftGenieNote>, StoreError>;

    /// All DFNs for a speaker, oldest first.
    async fn list_for_speaker(&self, speaker_id: &str)
    -> Result<Vec<DraftGenieNote>, StoreError>;
}

#[async_trait]
pub trait EvaluationStore: Send + Sync {
    async fn insert_pending(
        &self,
        evaluation: &Evaluation,
    ) -> Result<InsertOutcome<Evaluation>, StoreError>;

    /// Writes the terminal state. Rejects a second terminal write.
    async fn finalize(&self, evaluation: &Evaluation) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Evaluation>, StoreError>;

    async fn list_for_speaker(&self, speaker_id: &str) -> Result<Vec<Evaluation>, StoreError>;
}

#[async_trait]
pub trait TransitionLog: Send + Sync {
    async fn append(&self, transition: &BucketTransition) -> Result<(), StoreError>;

    /// Transitions for a speaker in the order they were appended.
    async fn history(&self, speaker_id: &str) -> Result<Vec<BucketTransition>, StoreError>;
}

/// Oldest first, ID as the tie-break.
pub(crate) fn sort_records<R: Record>(records: &mut [R]) {
    records.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.id().cmp(b.id()))
    });
}
