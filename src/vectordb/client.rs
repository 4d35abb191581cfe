use std::collections::HashMap;

use async_trait::async_trait;
use half::f16;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};
use tracing::{debug, info};

use super::error::VectorDbError;
use super::model::{IndexEntry, IndexHit, PAYLOAD_SPEAKER_ID, PAYLOAD_VERSION};
use super::{VectorIndex, WriteConsistency};
use crate::embedding::to_f32;

/// Qdrant-backed [`VectorIndex`] over a single cosine-distance collection.
#[derive(Clone)]
pub struct QdrantVectorIndex {
    client: Qdrant,
    url: String,
    collection: String,
    vector_size: u64,
    consistency: WriteConsistency,
}

impl QdrantVectorIndex {
    /// Connects and creates `collection` if it is missing.
    pub async fn connect(
        url: &str,
        collection: &str,
        vector_size: u64,
    ) -> Result<Self, VectorDbError> {
        let client =
            Qdrant::from_url(url)
                .build()
                .map_err(|e| VectorDbError::ConnectionFailed {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;

        let index = Self {
            client,
            url: url.to_string(),
            collection: collection.to_string(),
            vector_size,
            consistency: WriteConsistency::Strong,
        };
        index.ensure_collection().await?;
        Ok(index)
    }

    pub fn with_consistency(mut self, consistency: WriteConsistency) -> Self {
        self.consistency = consistency;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub async fn health_check(&self) -> Result<(), VectorDbError> {
        self.client
            .health_check()
            .await
            .map_err(|e| VectorDbError::ConnectionFailed {
                url: self.url.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn ensure_collection(&self) -> Result<(), VectorDbError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| VectorDbError::CreateCollectionFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;

        if !exists {
            let vectors_config = VectorParamsBuilder::new(self.vector_size, Distance::Cosine);
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection)
                        .vectors_config(vectors_config)
                        .on_disk_payload(true),
                )
                .await
                .map_err(|e| VectorDbError::CreateCollectionFailed {
                    collection: self.collection.clone(),
                    message: e.to_string(),
                })?;
            info!(
                collection = %self.collection,
                vector_size = self.vector_size,
                "Created Qdrant collection"
            );
        }

        Ok(())
    }

    fn check_dimension(&self, len: usize) -> Result<(), VectorDbError> {
        if len as u64 != self.vector_size {
            return Err(VectorDbError::InvalidDimension {
                expected: self.vector_size as usize,
                actual: len,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    async fn upsert(&self, entry: IndexEntry) -> Result<(), VectorDbError> {
        self.check_dimension(entry.embedding.len())?;

        let point_id = entry.point_id();
        let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
        for (key, value) in entry.metadata {
            payload.insert(key, value.into());
        }
        payload.insert(PAYLOAD_SPEAKER_ID.to_string(), entry.speaker_id.clone().into());
        payload.insert(PAYLOAD_VERSION.to_string(), (entry.version as i64).into());

        let point = PointStruct::new(point_id, to_f32(&entry.embedding), payload);

        self.client
            .upsert_points(
                UpsertPointsBuilder::new(&self.collection, vec![point])
                    .wait(self.consistency.into()),
            )
            .await
            .map_err(|e| VectorDbError::UpsertFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;

        debug!(
            speaker_id = %entry.speaker_id,
            version = entry.version,
            point_id,
            "Upserted correction vector embedding"
        );
        Ok(())
    }

    async fn search(&self, embedding: &[f16], top_k: u64) -> Result<Vec<IndexHit>, VectorDbError> {
        self.check_dimension(embedding.len())?;

        let result = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, to_f32(embedding), top_k)
                    .with_payload(true),
            )
            .await
            .map_err(|e| VectorDbError::SearchFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;

        Ok(result
            .result
            .into_iter()
            .filter_map(IndexHit::from_scored_point)
            .collect())
    }
}
