//! Vector index for correction-vector embeddings.
//!
//! One point per `(speaker_id, version)`. The point ID is derived from that pair and the
//! payload carries both, so search hits map straight back to a stored vector.

pub mod client;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod model;


pub use client::QdrantVectorIndex;
pub use error::VectorDbError;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockVectorIndex;
pub use model::{IndexEntry, IndexHit, IndexMetadata};

use async_trait::async_trait;
use half::f16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteConsistency {
    /// Wait until the point is searchable. Maps to `wait=true`.
    Strong,
    /// Return once the server acknowledges receipt. Maps to `wait=false`.
    Eventual,
}

impl From<WriteConsistency> for bool {
    fn from(c: WriteConsistency) -> bool {
        matches!(c, WriteConsistency::Strong)
    }
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Inserts or replaces the point for `(entry.speaker_id, entry.version)`.
    async fn upsert(&self, entry: IndexEntry) -> Result<(), VectorDbError>;

    /// Nearest neighbours by cosine similarity, best first.
    async fn search(&self, embedding: &[f16], top_k: u64) -> Result<Vec<IndexHit>, VectorDbError>;
}
