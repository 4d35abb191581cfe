use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::backend::GenerativeBackend;
use super::error::{BackendError, RagError};
use super::model::{
    DraftGenieNote, FailureKind, GenerationFailure, GenerationStage, NoteProvenance, NoteStatus,
    PromptRecord, PromptStorage, VectorRef,
};
use super::prompt::{FewShotExample, PromptParts, assemble_prompt, estimate_tokens};
use crate::constants::{
    DEFAULT_BACKEND_CONTEXT_TOKENS, DEFAULT_COLD_START_TOP_K, DEFAULT_FEW_SHOT_MAX_CHARS,
    DEFAULT_FEW_SHOT_WINDOW, DEFAULT_GENERATION_TIMEOUT_SECS, DEFAULT_MAX_COMPLETION_TOKENS,
    DEFAULT_MAX_PROMPT_RULES, MAX_ATTEMPT_PROBES,
};
use crate::drafts::{Draft, DraftStore, DraftType, pair_history};
use crate::embedding::TextEmbedder;
use crate::events::{DomainEvent, EventEnvelope, EventPublisher};
use crate::hashing::dfn_id;
use crate::registry::SpeakerRegistry;
use crate::store::{CorrectionVectorStore, InsertOutcome, NoteStore, StoreError};
use crate::vector::{CorrectionVector, PairRef};
use crate::vectordb::VectorIndex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub max_prompt_rules: usize,
    pub few_shot_window: usize,
    pub few_shot_max_chars: usize,
    pub generation_timeout: Duration,
    pub max_completion_tokens: u32,
    pub backend_context_tokens: u32,
    pub cold_start_top_k: u64,
    pub prompt_storage: PromptStorage,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_prompt_rules: DEFAULT_MAX_PROMPT_RULES,
            few_shot_window: DEFAULT_FEW_SHOT_WINDOW,
            few_shot_max_chars: DEFAULT_FEW_SHOT_MAX_CHARS,
            generation_timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
            max_completion_tokens: DEFAULT_MAX_COMPLETION_TOKENS,
            backend_context_tokens: DEFAULT_BACKEND_CONTEXT_TOKENS,
            cold_start_top_k: DEFAULT_COLD_START_TOP_K,
            prompt_storage: PromptStorage::Full,
        }
    }
}

/// How the DFN ID's attempt component is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    /// Next unused ordinal for this (speaker, draft, vector version); always a new DFN.
    Next,
    /// Caller-supplied key, normally the triggering event ID; repeats map to one DFN.
    Keyed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub speaker_id: String,
    pub source_draft_id: String,
    pub prompt_override: Option<String>,
    pub attempt: Attempt,
}

impl GenerationRequest {
    pub fn new(speaker_id: impl Into<String>, source_draft_id: impl Into<String>) -> Self {
        Self {
            speaker_id: speaker_id.into(),
            source_draft_id: source_draft_id.into(),
            prompt_override: None,
            attempt: Attempt::Next,
        }
    }

    pub fn with_prompt_override(mut self, instructions: impl Into<String>) -> Self {
        self.prompt_override = Some(instructions.into());
        self
    }

    pub fn with_attempt_key(mut self, key: impl Into<String>) -> Self {
        self.attempt = Attempt::Keyed(key.into());
        self
    }
}

struct ResolvedVector {
    vector: CorrectionVector,
    borrowed: bool,
}

/// Terminal outcome of the prompting and generating stages.
type StageOutcome = Result<(PromptRecord, String), (Option<PromptRecord>, GenerationFailure)>;

/// Generates draft genie notes from a speaker's correction vector and history.
#[derive(Clone)]
pub struct RagOrchestrator {
    config: OrchestratorConfig,
    registry: Arc<dyn SpeakerRegistry>,
    drafts: Arc<dyn DraftStore>,
    vectors: Arc<dyn CorrectionVectorStore>,
    notes: Arc<dyn NoteStore>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn TextEmbedder>,
    backend: Arc<dyn GenerativeBackend>,
    publisher: Arc<dyn EventPublisher>,
}

impl RagOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: OrchestratorConfig,
        registry: Arc<dyn SpeakerRegistry>,
        drafts: Arc<dyn DraftStore>,
        vectors: Arc<dyn CorrectionVectorStore>,
        notes: Arc<dyn NoteStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn TextEmbedder>,
        backend: Arc<dyn GenerativeBackend>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            config,
            registry,
            drafts,
            vectors,
            notes,
            index,
            embedder,
            backend,
            publisher,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Direct call: every invocation creates a new DFN.
    pub async fn generate(
        &self,
        speaker_id: &str,
        source_draft_id: &str,
        prompt_override: Option<&str>,
    ) -> Result<DraftGenieNote, RagError> {
        let mut request = GenerationRequest::new(speaker_id, source_draft_id);
        request.prompt_override = prompt_override.map(str::to_string);
        self.generate_with(request, CancellationToken::new()).await
    }

    /// Runs one generation request.
    ///
    /// Precondition failures return `Err` and write nothing. Once a PENDING DFN exists,
    /// every outcome (including backend failure and cancellation) is returned as
    /// `Ok` with the finalized record.
    ///
    /// Cancellation during the backend call stops waiting for it; the backend request
    /// itself may still complete on the provider side.
    #[instrument(
        skip(self, request, cancel),
        fields(speaker_id = %request.speaker_id, source_draft_id = %request.source_draft_id)
    )]
    pub async fn generate_with(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<DraftGenieNote, RagError> {
        debug!(stage = GenerationStage::Retrieving.as_str(), "Checking preconditions");
        let source = self.load_source(&request).await?;
        let resolved = self.resolve_vector(&request.speaker_id, &source).await?;

        let mut pending = match self.insert_pending(&request, &source, &resolved).await? {
            InsertOutcome::Inserted(note) => note,
            InsertOutcome::Existing(note) if note.status.is_terminal() => {
                debug!(
                    dfn_id = %note.id,
                    status = ?note.status,
                    "DFN already exists for this attempt"
                );
                return Ok(note);
            }
            InsertOutcome::Existing(note) => {
                info!(dfn_id = %note.id, "Resuming DFN left pending by an interrupted run");
                note
            }
        };

        let outcome = self
            .run_stages(&request, &source, &resolved, &cancel)
            .await;
        let final_note = match outcome {
            Ok((examples, rule_count, Ok((prompt, text)))) => {
                pending.provenance.few_shot_pairs = examples;
                pending.provenance.rule_count = rule_count;
                pending.into_generated(prompt, text)
            }
            Ok((examples, rule_count, Err((prompt, failure)))) => {
                pending.provenance.few_shot_pairs = examples;
                pending.provenance.rule_count = rule_count;
                pending.into_failed(prompt, failure)
            }
            Err(failure) => pending.into_failed(None, failure),
        };

        match self.notes.finalize(&final_note).await {
            Ok(()) => {}
            Err(StoreError::AlreadyFinalized { .. }) => {
                // A concurrent resume finished first; its record wins.
                if let Some(stored) = self.notes.get(&final_note.id).await? {
                    return Ok(stored);
                }
            }
            Err(e) => return Err(e.into()),
        }
        self.log_outcome(&final_note);

        let event = EventEnvelope::new(DomainEvent::DfnGenerated {
            dfn_id: final_note.id.clone(),
            speaker_id: final_note.speaker_id.clone(),
            status: final_note.status,
        });
        if let Err(e) = self.publisher.publish(event).await {
            warn!(dfn_id = %final_note.id, error = %e, "Failed to publish dfn.generated");
        }

        Ok(final_note)
    }

    async fn load_source(&self, request: &GenerationRequest) -> Result<Draft, RagError> {
        let speaker = self
            .registry
            .get_speaker(&request.speaker_id)
            .await?
            .ok_or_else(|| RagError::UnknownSpeaker {
                speaker_id: request.speaker_id.clone(),
            })?;
        if !speaker.is_servable() {
            return Err(RagError::InactiveSpeaker {
                speaker_id: speaker.id,
            });
        }

        let draft = self
            .drafts
            .get_draft(&request.source_draft_id)
            .await?
            .ok_or_else(|| RagError::UnknownDraft {
                draft_id: request.source_draft_id.clone(),
            })?;
        if draft.speaker_id != speaker.id {
            return Err(RagError::DraftSpeakerMismatch {
                draft_id: draft.id,
                speaker_id: speaker.id,
                owner: draft.speaker_id,
            });
        }
        if !draft.draft_type.is_candidate() {
            return Err(RagError::NotACandidate {
                draft_id: draft.id,
                draft_type: draft.draft_type,
            });
        }
        if draft.text.split_whitespace().next().is_none() {
            return Err(RagError::EmptyDraft { draft_id: draft.id });
        }
        Ok(draft)
    }

    /// The speaker's current vector, else the nearest vector of another speaker.
    async fn resolve_vector(
        &self,
        speaker_id: &str,
        source: &Draft,
    ) -> Result<ResolvedVector, RagError> {
        if let Some(vector) = self.vectors.latest(speaker_id).await? {
            return Ok(ResolvedVector {
                vector,
                borrowed: false,
            });
        }

        let query = self.embedder.embed(&source.text)?;
        let hits = self
            .index
            .search(&query, self.config.cold_start_top_k)
            .await?;

        for hit in hits.iter().filter(|h| h.speaker_id != speaker_id) {
            if let Some(vector) = self.vectors.get(&hit.speaker_id, hit.version).await? {
                info!(
                    speaker_id,
                    borrowed_speaker = %hit.speaker_id,
                    borrowed_version = hit.version,
                    score = hit.score,
                    "Cold start: borrowing nearest correction vector"
                );
                return Ok(ResolvedVector {
                    vector,
                    borrowed: true,
                });
            }
            warn!(
                borrowed_speaker = %hit.speaker_id,
                version = hit.version,
                "Index hit has no stored vector; skipping"
            );
        }

        Err(RagError::NoCorrectionVector {
            speaker_id: speaker_id.to_string(),
        })
    }

    async fn insert_pending(
        &self,
        request: &GenerationRequest,
        source: &Draft,
        resolved: &ResolvedVector,
    ) -> Result<InsertOutcome<DraftGenieNote>, RagError> {
        let version = resolved.vector.version;
        let provenance = NoteProvenance {
            cold_start: resolved.borrowed,
            borrowed_vector: resolved.borrowed.then(|| VectorRef {
                speaker_id: resolved.vector.speaker_id.clone(),
                version,
            }),
            few_shot_pairs: Vec::new(),
            rule_count: 0,
        };

        let make_note = |attempt_key: String| DraftGenieNote {
            id: dfn_id(&request.speaker_id, &source.id, version, &attempt_key),
            speaker_id: request.speaker_id.clone(),
            source_draft_id: source.id.clone(),
            note_key: source.note_key.clone(),
            vector_version: version,
            attempt_key,
            status: NoteStatus::Pending,
            prompt: None,
            generated_text: None,
            provenance: provenance.clone(),
            failure: None,
            created_at: Utc::now(),
            completed_at: None,
        };

        match &request.attempt {
            Attempt::Keyed(key) => Ok(self.notes.insert_pending(&make_note(key.clone())).await?),
            Attempt::Next => {
                let previous = self
                    .notes
                    .list_for_speaker(&request.speaker_id)
                    .await?
                    .iter()
                    .filter(|n| n.source_draft_id == source.id && n.vector_version == version)
                    .count();

                let mut ordinal = previous + 1;
                loop {
                    let outcome = self
                        .notes
                        .insert_pending(&make_note(format!("attempt-{ordinal}")))
                        .await?;
                    if outcome.was_inserted() {
                        return Ok(outcome);
                    }
                    if ordinal >= previous + MAX_ATTEMPT_PROBES {
                        return Err(RagError::AttemptsExhausted {
                            source_draft_id: source.id.clone(),
                            probes: MAX_ATTEMPT_PROBES,
                        });
                    }
                    ordinal += 1;
                }
            }
        }
    }

    /// Few-shot retrieval, prompting and the backend call.
    ///
    /// `Err` carries a failure from before the prompt existed.
    async fn run_stages(
        &self,
        request: &GenerationRequest,
        source: &Draft,
        resolved: &ResolvedVector,
        cancel: &CancellationToken,
    ) -> Result<(Vec<PairRef>, usize, StageOutcome), GenerationFailure> {
        let examples = self.few_shot(source).await.map_err(|e| {
            GenerationFailure::new(
                FailureKind::Internal,
                GenerationStage::Retrieving,
                e.to_string(),
            )
        })?;
        let example_refs: Vec<PairRef> = examples.iter().map(|e| e.pair.clone()).collect();

        debug!(stage = GenerationStage::Prompting.as_str(), "Assembling prompt");
        let rules: Vec<_> = resolved
            .vector
            .resolved_rules()
            .into_iter()
            .take(self.config.max_prompt_rules)
            .collect();
        let prompt = assemble_prompt(&PromptParts {
            source_text: &source.text,
            rules: &rules,
            examples: &examples,
            instructions: request.prompt_override.as_deref(),
        });
        let record = PromptRecord::new(&prompt, self.config.prompt_storage);
        let rule_count = rules.len();

        let budget = estimate_tokens(&prompt) + self.config.max_completion_tokens as usize;
        if budget > self.config.backend_context_tokens as usize {
            let failure = GenerationFailure::new(
                FailureKind::InvalidRequest,
                GenerationStage::Prompting,
                format!(
                    "prompt needs ~{budget} tokens with completion; backend context is {}",
                    self.config.backend_context_tokens
                ),
            );
            return Ok((example_refs, rule_count, Err((Some(record), failure))));
        }

        if cancel.is_cancelled() {
            let failure = GenerationFailure::new(
                FailureKind::Cancelled,
                GenerationStage::Prompting,
                "cancelled before backend call",
            );
            return Ok((example_refs, rule_count, Err((Some(record), failure))));
        }

        debug!(stage = GenerationStage::Generating.as_str(), "Calling backend");
        let timeout = self.config.generation_timeout;
        let call = tokio::time::timeout(
            timeout,
            self.backend
                .complete(&prompt, self.config.max_completion_tokens, timeout),
        );

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                Err(GenerationFailure::new(
                    FailureKind::Cancelled,
                    GenerationStage::Generating,
                    "cancelled while waiting for backend",
                ))
            }
            outcome = call => match outcome {
                Err(_) => Err(backend_failure(&BackendError::Timeout { after: timeout })),
                Ok(Err(e)) => Err(backend_failure(&e)),
                Ok(Ok(text)) if text.trim().is_empty() => Err(backend_failure(
                    &BackendError::MalformedResponse {
                        message: "empty completion".to_string(),
                    },
                )),
                Ok(Ok(text)) => Ok(text.trim().to_string()),
            },
        };

        let stage = match result {
            Ok(text) => Ok((record, text)),
            Err(failure) => Err((Some(record), failure)),
        };
        Ok((example_refs, rule_count, stage))
    }

    /// Most recent pairs for the speaker, never including the source's own note.
    async fn few_shot(&self, source: &Draft) -> Result<Vec<FewShotExample>, RagError> {
        if self.config.few_shot_window == 0 {
            return Ok(Vec::new());
        }

        let drafts = self
            .drafts
            .get_drafts_for_speaker(&source.speaker_id, &DraftType::ALL, None)
            .await?;
        let pairs: Vec<_> = pair_history(&drafts)
            .into_iter()
            .filter(|p| p.draft.note_key != source.note_key && p.draft.id != source.id)
            .collect();

        let skip = pairs.len().saturating_sub(self.config.few_shot_window);
        Ok(pairs
            .into_iter()
            .skip(skip)
            .map(|p| {
                FewShotExample::truncated(
                    PairRef {
                        draft_id: p.draft.id.clone(),
                        ground_truth_id: p.ground_truth.id.clone(),
                    },
                    &p.draft.text,
                    &p.ground_truth.text,
                    self.config.few_shot_max_chars,
                )
            })
            .collect())
    }

    fn log_outcome(&self, note: &DraftGenieNote) {
        match (&note.status, &note.failure) {
            (NoteStatus::Generated, _) => info!(
                dfn_id = %note.id,
                vector_version = note.vector_version,
                cold_start = note.provenance.cold_start,
                rule_count = note.provenance.rule_count,
                "DFN generated"
            ),
            (_, Some(failure)) => warn!(
                dfn_id = %note.id,
                kind = ?failure.kind,
                stage = failure.stage.as_str(),
                retryable = failure.retryable,
                message = %failure.message,
                "DFN generation failed"
            ),
            _ => {}
        }
    }
}

fn backend_failure(error: &BackendError) -> GenerationFailure {
    GenerationFailure::new(
        error.failure_kind(),
        GenerationStage::Generating,
        error.to_string(),
    )
}
