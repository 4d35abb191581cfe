use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use super::error::VectorBuildError;
use super::extract::extract_rules;
use super::model::{CorrectionVector, PairRef};
use crate::constants::{DEFAULT_MAX_NGRAM, DEFAULT_MIN_RULE_FREQUENCY};
use crate::drafts::{DraftPair, DraftStore, DraftType, pair_history};
use crate::embedding::TextEmbedder;
use crate::events::{DomainEvent, EventEnvelope, EventPublisher};
use crate::hashing::build_fingerprint;
use crate::store::CorrectionVectorStore;
use crate::text::{AlignedText, NormalizationPolicy, TextAligner};
use crate::vectordb::{IndexEntry, VectorIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuilderConfig {
    pub min_frequency: u32,
    pub max_ngram: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            min_frequency: DEFAULT_MIN_RULE_FREQUENCY,
            max_ngram: DEFAULT_MAX_NGRAM,
        }
    }
}

/// Learns per-speaker correction vectors from draft/final-note pairs.
#[derive(Clone)]
pub struct CorrectionVectorBuilder {
    config: BuilderConfig,
    aligner: TextAligner,
    embedder: Arc<dyn TextEmbedder>,
    vectors: Arc<dyn CorrectionVectorStore>,
    index: Arc<dyn VectorIndex>,
    drafts: Arc<dyn DraftStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl CorrectionVectorBuilder {
    pub fn new(
        config: BuilderConfig,
        embedder: Arc<dyn TextEmbedder>,
        vectors: Arc<dyn CorrectionVectorStore>,
        index: Arc<dyn VectorIndex>,
        drafts: Arc<dyn DraftStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            config,
            aligner: TextAligner::new(NormalizationPolicy::case_preserving()),
            embedder,
            vectors,
            index,
            drafts,
            publisher,
        }
    }

    pub fn config(&self) -> BuilderConfig {
        self.config
    }

    /// Builds and publishes a new vector version from `pairs`.
    ///
    /// Returns the current vector unchanged when it was built from the same pairs with
    /// the same parameters.
    #[instrument(skip(self, pairs), fields(pair_count = pairs.len()))]
    pub async fn build(
        &self,
        speaker_id: &str,
        pairs: &[DraftPair],
    ) -> Result<CorrectionVector, VectorBuildError> {
        let usable = self.alignable_pairs(speaker_id, pairs)?;
        if usable.is_empty() {
            return Err(VectorBuildError::InsufficientHistory {
                speaker_id: speaker_id.to_string(),
            });
        }

        let provenance: Vec<PairRef> = usable
            .values()
            .map(|(pair, _)| PairRef {
                draft_id: pair.draft.id.clone(),
                ground_truth_id: pair.ground_truth.id.clone(),
            })
            .collect();
        let keys: Vec<String> = usable.keys().cloned().collect();
        let fingerprint =
            build_fingerprint(&keys, self.config.min_frequency, self.config.max_ngram);

        let current = self.vectors.latest(speaker_id).await?;
        if let Some(current) = current.as_ref().filter(|v| v.fingerprint == fingerprint) {
            debug!(
                speaker_id,
                version = current.version,
                "Correction vector inputs unchanged; keeping current version"
            );
            self.index_vector(current).await;
            return Ok(current.clone());
        }

        let aligned: Vec<AlignedText> = usable.into_values().map(|(_, a)| a).collect();
        let rules = extract_rules(&aligned, self.config.min_frequency, self.config.max_ngram);
        let embedding = self.embedder.embed(&CorrectionVector::rule_text(&rules))?;

        let vector = CorrectionVector {
            speaker_id: speaker_id.to_string(),
            version: current.as_ref().map_or(1, |v| v.version + 1),
            rules,
            embedding,
            provenance,
            min_frequency: self.config.min_frequency,
            max_ngram: self.config.max_ngram,
            fingerprint,
            model_id: self.embedder.model_id().to_string(),
            created_at: Utc::now(),
        };

        self.vectors.append(&vector).await?;
        self.index_vector(&vector).await;

        info!(
            speaker_id,
            version = vector.version,
            rule_count = vector.rules.len(),
            pair_count = vector.provenance.len(),
            "Published correction vector"
        );

        let event = EventEnvelope::new(DomainEvent::CorrectionVectorUpdated {
            speaker_id: speaker_id.to_string(),
            version: vector.version,
        });
        if let Err(e) = self.publisher.publish(event).await {
            warn!(
                speaker_id,
                version = vector.version,
                error = %e,
                "Failed to publish vector update"
            );
        }

        Ok(vector)
    }

    /// Rebuilds over the current vector's pairs plus `new_pairs`.
    ///
    /// Provenance pairs are re-fetched from the draft store; ones whose drafts are gone
    /// are dropped.
    #[instrument(skip(self, new_pairs), fields(new_pair_count = new_pairs.len()))]
    pub async fn update(
        &self,
        speaker_id: &str,
        new_pairs: &[DraftPair],
    ) -> Result<CorrectionVector, VectorBuildError> {
        let mut pairs: Vec<DraftPair> = Vec::new();

        if let Some(current) = self.vectors.latest(speaker_id).await? {
            for pair_ref in &current.provenance {
                let draft = self.drafts.get_draft(&pair_ref.draft_id).await?;
                let ground_truth = self.drafts.get_draft(&pair_ref.ground_truth_id).await?;
                match (draft, ground_truth) {
                    (Some(draft), Some(ground_truth)) => {
                        pairs.push(DraftPair {
                            draft,
                            ground_truth,
                        });
                    }
                    _ => warn!(
                        speaker_id,
                        pair = %pair_ref.key(),
                        "Provenance pair no longer in draft store; dropping"
                    ),
                }
            }
        }

        pairs.extend_from_slice(new_pairs);
        self.build(speaker_id, &pairs).await
    }

    /// Pairs the speaker's full draft history and builds from it.
    #[instrument(skip(self))]
    pub async fn build_from_history(
        &self,
        speaker_id: &str,
    ) -> Result<CorrectionVector, VectorBuildError> {
        let drafts = self
            .drafts
            .get_drafts_for_speaker(speaker_id, &DraftType::ALL, None)
            .await?;
        let pairs = pair_history(&drafts);
        debug!(
            speaker_id,
            draft_count = drafts.len(),
            pair_count = pairs.len(),
            "Loaded draft history"
        );
        self.build(speaker_id, &pairs).await
    }

    /// Dedupes by pair key and aligns each pair. Pairs that cannot be aligned are
    /// skipped.
    fn alignable_pairs<'a>(
        &self,
        speaker_id: &str,
        pairs: &'a [DraftPair],
    ) -> Result<BTreeMap<String, (&'a DraftPair, AlignedText)>, VectorBuildError> {
        let mut usable = BTreeMap::new();

        for pair in pairs {
            let key = pair.key();
            if pair.draft.speaker_id != speaker_id || pair.ground_truth.speaker_id != speaker_id {
                return Err(VectorBuildError::ForeignPair {
                    speaker_id: speaker_id.to_string(),
                    owner: if pair.draft.speaker_id != speaker_id {
                        pair.draft.speaker_id.clone()
                    } else {
                        pair.ground_truth.speaker_id.clone()
                    },
                    pair_key: key,
                });
            }
            if usable.contains_key(&key) {
                continue;
            }

            match self
                .aligner
                .align_text(&pair.draft.text, &pair.ground_truth.text)
            {
                Ok(aligned) => {
                    usable.insert(key, (pair, aligned));
                }
                Err(e) => warn!(speaker_id, pair = %key, error = %e, "Skipping unalignable pair"),
            }
        }

        Ok(usable)
    }

    async fn index_vector(&self, vector: &CorrectionVector) {
        if vector.rules.is_empty() {
            debug!(
                speaker_id = %vector.speaker_id,
                version = vector.version,
                "Vector has no rules; not indexing"
            );
            return;
        }

        let entry = IndexEntry::new(
            vector.speaker_id.clone(),
            vector.version,
            vector.embedding.clone(),
        )
        .with_metadata("model_id", vector.model_id.clone())
        .with_metadata("rule_count", vector.rules.len().to_string())
        .with_metadata("fingerprint", vector.fingerprint.clone());

        if let Err(e) = self.index.upsert(entry).await {
            warn!(
                speaker_id = %vector.speaker_id,
                version = vector.version,
                error = %e,
                "Failed to index correction vector; cold-start lookups will miss it"
            );
        }
    }
}
