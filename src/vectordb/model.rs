use std::collections::HashMap;

use half::f16;
use qdrant_client::qdrant::ScoredPoint;
use qdrant_client::qdrant::point_id::PointIdOptions;

use crate::hashing::vector_point_id;

/// Free-form string metadata stored beside a point.
pub type IndexMetadata = HashMap<String, String>;

pub(crate) const PAYLOAD_SPEAKER_ID: &str = "speaker_id";
pub(crate) const PAYLOAD_VERSION: &str = "version";

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub speaker_id: String,
    pub version: u64,
    pub embedding: Vec<f16>,
    pub metadata: IndexMetadata,
}

impl IndexEntry {
    pub fn new(speaker_id: impl Into<String>, version: u64, embedding: Vec<f16>) -> Self {
        Self {
            speaker_id: speaker_id.into(),
            version,
            embedding,
            metadata: IndexMetadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn point_id(&self) -> u64 {
        vector_point_id(&self.speaker_id, self.version)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub speaker_id: String,
    pub version: u64,
    pub score: f32,
}

impl IndexHit {
    /// Maps a Qdrant hit back to `(speaker_id, version)`.
    ///
    /// Hits with a missing payload, or whose point ID does not match the payload, are
    /// dropped.
    pub fn from_scored_point(point: ScoredPoint) -> Option<Self> {
        let id = match point.id.and_then(|pid| pid.point_id_options) {
            Some(PointIdOptions::Num(n)) => n,
            _ => return None,
        };

        let payload = point.payload;
        let speaker_id = payload.get(PAYLOAD_SPEAKER_ID)?.as_str()?.to_string();
        let version = u64::try_from(payload.get(PAYLOAD_VERSION)?.as_integer()?).ok()?;

        if vector_point_id(&speaker_id, version) != id {
            return None;
        }

        Some(IndexHit {
            speaker_id,
            version,
            score: point.score,
        })
    }
}
