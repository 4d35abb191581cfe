use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use half::f16;
use parking_lot::RwLock;

use super::error::VectorDbError;
use super::model::{IndexEntry, IndexHit};
use super::VectorIndex;
use crate::embedding::cosine_similarity;

/// In-memory [`VectorIndex`] with brute-force cosine search.
#[derive(Debug, Default)]
pub struct MockVectorIndex {
    points: RwLock<HashMap<u64, IndexEntry>>,
    dimension: Option<usize>,
    failing_upserts: AtomicUsize,
}

impl MockVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects entries and queries of any other length.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            points: RwLock::new(HashMap::new()),
            dimension: Some(dimension),
            failing_upserts: AtomicUsize::new(0),
        }
    }

    /// Makes the next `count` upserts fail as if Qdrant were unreachable.
    pub fn fail_next_upserts(&self, count: usize) {
        self.failing_upserts.store(count, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.points.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.read().is_empty()
    }

    pub fn contains(&self, speaker_id: &str, version: u64) -> bool {
        self.points
            .read()
            .values()
            .any(|e| e.speaker_id == speaker_id && e.version == version)
    }

    pub fn metadata(&self, speaker_id: &str, version: u64) -> Option<super::IndexMetadata> {
        self.points
            .read()
            .values()
            .find(|e| e.speaker_id == speaker_id && e.version == version)
            .map(|e| e.metadata.clone())
    }

    fn check_dimension(&self, len: usize) -> Result<(), VectorDbError> {
        match self.dimension {
            Some(expected) if expected != len => Err(VectorDbError::InvalidDimension {
                expected,
                actual: len,
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl VectorIndex for MockVectorIndex {
    async fn upsert(&self, entry: IndexEntry) -> Result<(), VectorDbError> {
        self.check_dimension(entry.embedding.len())?;
        if self
            .failing_upserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(VectorDbError::UpsertFailed {
                collection: "mock".to_string(),
                message: "injected failure".to_string(),
            });
        }
        self.points.write().insert(entry.point_id(), entry);
        Ok(())
    }

    async fn search(&self, embedding: &[f16], top_k: u64) -> Result<Vec<IndexHit>, VectorDbError> {
        self.check_dimension(embedding.len())?;

        let mut hits: Vec<IndexHit> = self
            .points
            .read()
            .values()
            .map(|e| IndexHit {
                speaker_id: e.speaker_id.clone(),
                version: e.version,
                score: cosine_similarity(embedding, &e.embedding) as f32,
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.speaker_id.cmp(&b.speaker_id))
                .then_with(|| b.version.cmp(&a.version))
        });
        hits.truncate(top_k as usize);
        Ok(hits)
    }
}
