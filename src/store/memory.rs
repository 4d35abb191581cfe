use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{
    CorrectionVectorStore, EvaluationStore, InsertOutcome, NoteStore, Record, StoreError,
    TransitionLog, sort_records,
};
use crate::bucket::BucketTransition;
use crate::evaluation::Evaluation;
use crate::rag::DraftGenieNote;
use crate::vector::CorrectionVector;

#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    versions: RwLock<HashMap<String, BTreeMap<u64, CorrectionVector>>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CorrectionVectorStore for MemoryVectorStore {
    async fn append(&self, vector: &CorrectionVector) -> Result<(), StoreError> {
        let mut guard = self.versions.write();
        let log = guard.entry(vector.speaker_id.clone()).or_default();
        if log.contains_key(&vector.version) {
            return Err(StoreError::VersionConflict {
                speaker_id: vector.speaker_id.clone(),
                version: vector.version,
            });
        }
        log.insert(vector.version, vector.clone());
        Ok(())
    }

    async fn latest(&self, speaker_id: &str) -> Result<Option<CorrectionVector>, StoreError> {
        Ok(self
            .versions
            .read()
            .get(speaker_id)
            .and_then(|log| log.values().next_back().cloned()))
    }

    async fn get(
        &self,
        speaker_id: &str,
        version: u64,
    ) -> Result<Option<CorrectionVector>, StoreError> {
        Ok(self
            .versions
            .read()
            .get(speaker_id)
            .and_then(|log| log.get(&version).cloned()))
    }

    async fn versions(&self, speaker_id: &str) -> Result<Vec<u64>, StoreError> {
        Ok(self
            .versions
            .read()
            .get(speaker_id)
            .map(|log| log.keys().copied().collect())
            .unwrap_or_default())
    }
}

/// In-memory table of insert-once, finalize-once records.
#[derive(Debug)]
pub struct MemoryRecords<R> {
    records: RwLock<HashMap<String, R>>,
}

pub type MemoryNoteStore = MemoryRecords<DraftGenieNote>;
pub type MemoryEvaluationStore = MemoryRecords<Evaluation>;

impl<R> Default for MemoryRecords<R> {
    fn default() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl<R: Record> MemoryRecords<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn insert_if_absent(&self, record: &R) -> InsertOutcome<R> {
        let mut guard = self.records.write();
        if let Some(existing) = guard.get(record.id()) {
            return InsertOutcome::Existing(existing.clone());
        }
        guard.insert(record.id().to_string(), record.clone());
        InsertOutcome::Inserted(record.clone())
    }

    fn finalize_record(&self, record: &R) -> Result<(), StoreError> {
        let mut guard = self.records.write();
        match guard.get(record.id()) {
            None => Err(StoreError::NotFound {
                kind: R::KIND,
                id: record.id().to_string(),
            }),
            Some(existing) if existing.is_terminal() => Err(StoreError::AlreadyFinalized {
                kind: R::KIND,
                id: record.id().to_string(),
            }),
            Some(_) => {
                guard.insert(record.id().to_string(), record.clone());
                Ok(())
            }
        }
    }

    fn get_record(&self, id: &str) -> Option<R> {
        self.records.read().get(id).cloned()
    }

    fn list(&self, speaker_id: &str) -> Vec<R> {
        let mut records: Vec<R> = self
            .records
            .read()
            .values()
            .filter(|r| r.speaker_id() == speaker_id)
            .cloned()
            .collect();
        sort_records(&mut records);
        records
    }
}

#[async_trait]
impl NoteStore for MemoryRecords<DraftGenieNote> {
    async fn insert_pending(
        &self,
        note: &DraftGenieNote,
    ) -> Result<InsertOutcome<DraftGenieNote>, StoreError> {
        Ok(self.insert_if_absent(note))
    }

    async fn finalize(&self, note: &DraftGenieNote) -> Result<(), StoreError> {
        self.finalize_record(note)
    }

    async fn get(&self, id: &str) -> Result<Option<DraftGenieNote>, StoreError> {
        Ok(self.get_record(id))
    }

    async fn list_for_speaker(
        &self,
        speaker_id: &str,
    ) -> Result<Vec<DraftGenieNote>, StoreError> {
        Ok(self.list(speaker_id))
    }
}

#[async_trait]
impl EvaluationStore for MemoryRecords<Evaluation> {
    async fn insert_pending(
        &self,
        evaluation: &Evaluation,
    ) -> Result<InsertOutcome<Evaluation>, StoreError> {
        Ok(self.insert_if_absent(evaluation))
    }

    async fn finalize(&self, evaluation: &Evaluation) -> Result<(), StoreError> {
        self.finalize_record(evaluation)
    }

    async fn get(&self, id: &str) -> Result<Option<Evaluation>, StoreError> {
        Ok(self.get_record(id))
    }

    async fn list_for_speaker(&self, speaker_id: &str) -> Result<Vec<Evaluation>, StoreError> {
        Ok(self.list(speaker_id))
    }
}

#[derive(Debug, Default)]
pub struct MemoryTransitionLog {
    entries: RwLock<Vec<BucketTransition>>,
}

impl MemoryTransitionLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransitionLog for MemoryTransitionLog {
    async fn append(&self, transition: &BucketTransition) -> Result<(), StoreError> {
        self.entries.write().push(transition.clone());
        Ok(())
    }

    async fn history(&self, speaker_id: &str) -> Result<Vec<BucketTransition>, StoreError> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|t| t.speaker_id == speaker_id)
            .cloned()
            .collect())
    }
}
