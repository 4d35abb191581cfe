use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{Draft, DraftStore, DraftStoreError, DraftType, sort_drafts};

/// Append-only in-process draft store.
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    drafts: RwLock<HashMap<String, Draft>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_drafts(drafts: impl IntoIterator<Item = Draft>) -> Self {
        let store = Self::new();
        for draft in drafts {
            store.ingest(draft);
        }
        store
    }

    /// Adds a draft. Returns `false` (and keeps the original) if the ID already exists.
    pub fn ingest(&self, draft: Draft) -> bool {
        let mut drafts = self.drafts.write();
        if drafts.contains_key(&draft.id) {
            return false;
        }
        drafts.insert(draft.id.clone(), draft);
        true
    }

    pub fn len(&self) -> usize {
        self.drafts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.read().is_empty()
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn get_drafts_for_speaker(
        &self,
        speaker_id: &str,
        types: &[DraftType],
        limit: Option<usize>,
    ) -> Result<Vec<Draft>, DraftStoreError> {
        let mut drafts: Vec<Draft> = self
            .drafts
            .read()
            .values()
            .filter(|d| d.speaker_id == speaker_id && types.contains(&d.draft_type))
            .cloned()
            .collect();

        sort_drafts(&mut drafts);

        if let Some(limit) = limit
            && drafts.len() > limit
        {
            drafts.drain(..drafts.len() - limit);
        }

        Ok(drafts)
    }

    async fn get_draft(&self, draft_id: &str) -> Result<Option<Draft>, DraftStoreError> {
        Ok(self.drafts.read().get(draft_id).cloned())
    }
}
