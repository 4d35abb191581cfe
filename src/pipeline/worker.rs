use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::error::PipelineError;
use crate::bucket::{Bucket, BucketProposal, BucketReassigner};
use crate::constants::DEFAULT_WORKER_CONCURRENCY;
use crate::drafts::DraftType;
use crate::evaluation::{EvaluationEngine, EvaluationError};
use crate::events::{DomainEvent, EventEnvelope, EventStream};
use crate::hashing::evaluation_id;
use crate::rag::{GenerationRequest, NoteStatus, RagOrchestrator};
use crate::store::{EvaluationStore, NoteStore};
use crate::vector::CorrectionVectorBuilder;

/// What handling an event did.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleOutcome {
    VectorBuilt {
        speaker_id: String,
        version: u64,
    },
    Generated {
        dfn_id: String,
        status: NoteStatus,
    },
    Evaluated {
        evaluation_ids: Vec<String>,
    },
    BucketApplied {
        speaker_id: String,
        from: Bucket,
        to: Bucket,
    },
    Skipped {
        reason: &'static str,
    },
}

type SpeakerLock = Arc<AsyncMutex<()>>;

/// Consumes the event stream and drives the build, generate and evaluate stages.
///
/// Events run concurrently up to `concurrency`; events naming the same speaker run
/// one at a time.
#[derive(Clone)]
pub struct PipelineWorker {
    builder: Arc<CorrectionVectorBuilder>,
    orchestrator: Arc<RagOrchestrator>,
    engine: Arc<EvaluationEngine>,
    notes: Arc<dyn NoteStore>,
    evaluations: Arc<dyn EvaluationStore>,
    reassigner: Option<Arc<BucketReassigner>>,
    limiter: Arc<Semaphore>,
    speaker_locks: Arc<Mutex<HashMap<String, SpeakerLock>>>,
}

impl PipelineWorker {
    pub fn new(
        builder: CorrectionVectorBuilder,
        orchestrator: RagOrchestrator,
        engine: EvaluationEngine,
        notes: Arc<dyn NoteStore>,
        evaluations: Arc<dyn EvaluationStore>,
    ) -> Self {
        Self {
            builder: Arc::new(builder),
            orchestrator: Arc::new(orchestrator),
            engine: Arc::new(engine),
            notes,
            evaluations,
            reassigner: None,
            limiter: Arc::new(Semaphore::new(DEFAULT_WORKER_CONCURRENCY)),
            speaker_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.limiter = Arc::new(Semaphore::new(concurrency.max(1)));
        self
    }

    /// Applies reassignment proposals as they arrive instead of only logging them.
    pub fn with_auto_apply(mut self, reassigner: BucketReassigner) -> Self {
        self.reassigner = Some(Arc::new(reassigner));
        self
    }

    /// Runs until `shutdown` fires or every publisher is dropped, then waits for the
    /// events already taken off the stream.
    pub async fn run(self, mut stream: EventStream, shutdown: CancellationToken) {
        info!("Pipeline worker started");
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Shutdown requested");
                    break;
                }
                next = stream.next() => match next {
                    Some(envelope) => {
                        let worker = self.clone();
                        let cancel = shutdown.child_token();
                        tasks.spawn(async move { worker.process(envelope, cancel).await });
                    }
                    None => {
                        debug!("Event stream closed");
                        break;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Event task panicked");
                    }
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Event task panicked");
            }
        }
        info!("Pipeline worker stopped");
    }

    /// Handles one event under its speaker's lock and the concurrency limit, logging
    /// the result.
    ///
    /// The speaker lock is taken before the permit, so events queued behind a busy
    /// speaker hold no permit while they wait.
    pub async fn process(&self, envelope: EventEnvelope, cancel: CancellationToken) {
        let speaker = envelope.event.speaker_id().map(str::to_string);
        let lock = speaker.as_deref().map(|id| self.speaker_lock(id));
        let guard = match &lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let Ok(permit) = self.limiter.acquire().await else {
            drop(guard);
            if let (Some(speaker), Some(lock)) = (speaker, lock) {
                self.release_speaker_lock(&speaker, lock);
            }
            return;
        };

        let topic = envelope.topic();
        let event_id = envelope.event_id.clone();
        match self.handle(envelope, cancel).await {
            Ok(HandleOutcome::Skipped { reason }) => {
                debug!(topic, %event_id, reason, "Event skipped");
            }
            Ok(outcome) => debug!(topic, %event_id, ?outcome, "Event handled"),
            Err(e) if e.is_expected() => debug!(topic, %event_id, error = %e, "Event not actionable"),
            Err(e) => warn!(
                topic,
                %event_id,
                retryable = e.is_retryable(),
                error = %e,
                "Event handling failed"
            ),
        }

        drop(permit);
        drop(guard);
        if let (Some(speaker), Some(lock)) = (speaker, lock) {
            self.release_speaker_lock(&speaker, lock);
        }
    }

    /// Dispatches one event without taking locks.
    #[instrument(skip(self, envelope, cancel), fields(topic = envelope.topic(), event_id = %envelope.event_id))]
    pub async fn handle(
        &self,
        envelope: EventEnvelope,
        cancel: CancellationToken,
    ) -> Result<HandleOutcome, PipelineError> {
        match envelope.event {
            DomainEvent::SpeakerHistoryUpdated { speaker_id } => {
                let vector = self.builder.build_from_history(&speaker_id).await?;
                Ok(HandleOutcome::VectorBuilt {
                    speaker_id,
                    version: vector.version,
                })
            }
            DomainEvent::DraftIngested {
                speaker_id,
                draft_id,
                draft_type,
                note_key,
            } => match draft_type {
                DraftType::FinalNote => self.evaluate_note_key(&speaker_id, &note_key).await,
                DraftType::Asr | DraftType::Llm => {
                    let request = GenerationRequest::new(speaker_id, draft_id)
                        .with_attempt_key(envelope.event_id);
                    let note = self.orchestrator.generate_with(request, cancel).await?;
                    Ok(HandleOutcome::Generated {
                        dfn_id: note.id,
                        status: note.status,
                    })
                }
            },
            DomainEvent::DfnGenerated { dfn_id, status, .. } => {
                if status != NoteStatus::Generated {
                    return Ok(HandleOutcome::Skipped {
                        reason: "dfn was not generated",
                    });
                }
                match self.engine.evaluate(&dfn_id).await {
                    Ok(evaluation) => Ok(HandleOutcome::Evaluated {
                        evaluation_ids: vec![evaluation.id],
                    }),
                    Err(EvaluationError::GroundTruthUnavailable { .. }) => {
                        Ok(HandleOutcome::Skipped {
                            reason: "ground truth not ingested yet",
                        })
                    }
                    Err(e) => Err(e.into()),
                }
            }
            DomainEvent::BucketReassignmentProposed {
                speaker_id,
                from_bucket,
                to_bucket,
                evaluation_id,
            } => {
                let Some(reassigner) = &self.reassigner else {
                    info!(
                        %speaker_id,
                        %from_bucket,
                        %to_bucket,
                        %evaluation_id,
                        "Bucket reassignment proposed; awaiting review"
                    );
                    return Ok(HandleOutcome::Skipped {
                        reason: "auto-apply disabled",
                    });
                };
                let proposal = BucketProposal {
                    speaker_id,
                    from_bucket,
                    to_bucket,
                    evaluation_id,
                };
                let transition = reassigner.apply_proposal(&proposal).await?;
                Ok(HandleOutcome::BucketApplied {
                    speaker_id: transition.speaker_id,
                    from: transition.previous_bucket,
                    to: transition.new_bucket,
                })
            }
            DomainEvent::CorrectionVectorUpdated { .. } | DomainEvent::EvaluationCompleted { .. } => {
                Ok(HandleOutcome::Skipped {
                    reason: "informational topic",
                })
            }
        }
    }

    /// Evaluates the speaker's generated DFNs for a note key that have no finished
    /// evaluation yet.
    async fn evaluate_note_key(
        &self,
        speaker_id: &str,
        note_key: &str,
    ) -> Result<HandleOutcome, PipelineError> {
        let notes = self.notes.list_for_speaker(speaker_id).await?;
        let mut evaluation_ids = Vec::new();

        for note in notes
            .iter()
            .filter(|n| n.note_key == note_key && n.status == NoteStatus::Generated)
        {
            if let Some(existing) = self.evaluations.get(&evaluation_id(&note.id)).await?
                && existing.status.is_terminal()
            {
                continue;
            }
            match self.engine.evaluate(&note.id).await {
                Ok(evaluation) => evaluation_ids.push(evaluation.id),
                Err(e) => {
                    warn!(dfn_id = %note.id, error = %e, "Evaluation after ground truth ingest failed");
                }
            }
        }

        if evaluation_ids.is_empty() {
            return Ok(HandleOutcome::Skipped {
                reason: "no unevaluated dfns for note key",
            });
        }
        Ok(HandleOutcome::Evaluated { evaluation_ids })
    }

    fn speaker_lock(&self, speaker_id: &str) -> SpeakerLock {
        let mut locks = self.speaker_locks.lock();
        Arc::clone(locks.entry(speaker_id.to_string()).or_default())
    }

    fn release_speaker_lock(&self, speaker_id: &str, lock: SpeakerLock) {
        drop(lock);
        let mut locks = self.speaker_locks.lock();
        if locks
            .get(speaker_id)
            .is_some_and(|held| Arc::strong_count(held) == 1)
        {
            locks.remove(speaker_id);
        }
    }

    /// Speakers with a lock entry; entries go away once no event holds them.
    pub fn locked_speaker_count(&self) -> usize {
        self.speaker_locks.lock().len()
    }
}
