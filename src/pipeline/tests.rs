use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::bucket::{Bucket, BucketReassigner};
use crate::drafts::{Draft, DraftType, MemoryDraftStore};
use crate::embedding::HashingEmbedder;
use crate::evaluation::{EvaluationConfig, EvaluationEngine, EvaluationStatus};
use crate::events::{
    DomainEvent, EventEnvelope, EventPublisher, InProcessBus, RecordingPublisher, topics,
};
use crate::hashing::evaluation_id;
use crate::rag::{FailureKind, MockBackend, NoteStatus, OrchestratorConfig, RagOrchestrator};
use crate::registry::{MemorySpeakerRegistry, Speaker, SpeakerRegistry};
use crate::store::{
    CorrectionVectorStore, EvaluationStore, MemoryEvaluationStore, MemoryNoteStore,
    MemoryTransitionLog, MemoryVectorStore, NoteStore, TransitionLog,
};
use crate::vector::{BuilderConfig, CorrectionVectorBuilder};
use crate::vectordb::MockVectorIndex;

fn draft(id: &str, key: &str, kind: DraftType, text: &str, secs: i64) -> Draft {
    Draft {
        id: id.to_string(),
        speaker_id: "spk".to_string(),
        note_key: key.to_string(),
        draft_type: kind,
        text: text.to_string(),
        created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
    }
}

fn history() -> Vec<Draft> {
    vec![
        draft("ad-1", "n1", DraftType::Asr, "patient has diabetis type two", 0),
        draft("ifn-1", "n1", DraftType::FinalNote, "patient has diabetes type two", 5),
        draft("ad-2", "n2", DraftType::Asr, "diabetis is well controlled", 10),
        draft("ifn-2", "n2", DraftType::FinalNote, "diabetes is well controlled", 15),
        draft("ad-3", "n3", DraftType::Asr, "follow up for diabetis next month", 20),
    ]
}

fn final_note_n3() -> Draft {
    draft(
        "ifn-3",
        "n3",
        DraftType::FinalNote,
        "Follow up for diabetes next month.",
        30,
    )
}

struct Fixture {
    worker: PipelineWorker,
    registry: Arc<MemorySpeakerRegistry>,
    drafts: Arc<MemoryDraftStore>,
    vectors: Arc<MemoryVectorStore>,
    notes: Arc<MemoryNoteStore>,
    evaluations: Arc<MemoryEvaluationStore>,
    backend: Arc<MockBackend>,
    transitions: Arc<MemoryTransitionLog>,
}

fn fixture(publisher: Arc<dyn EventPublisher>, backend: MockBackend, auto_apply: bool) -> Fixture {
    let registry = Arc::new(MemorySpeakerRegistry::with_speakers([
        Speaker::new("spk", Bucket::Good),
        Speaker::new("newbie", Bucket::Average),
    ]));
    let drafts = Arc::new(MemoryDraftStore::with_drafts(history()));
    let vectors = Arc::new(MemoryVectorStore::new());
    let notes = Arc::new(MemoryNoteStore::new());
    let evaluations = Arc::new(MemoryEvaluationStore::new());
    let transitions = Arc::new(MemoryTransitionLog::new());
    let index = Arc::new(MockVectorIndex::new());
    let embedder = Arc::new(HashingEmbedder::default());
    let backend = Arc::new(backend);

    let builder = CorrectionVectorBuilder::new(
        BuilderConfig::default(),
        embedder.clone(),
        vectors.clone(),
        index.clone(),
        drafts.clone(),
        publisher.clone(),
    );
    let orchestrator = RagOrchestrator::new(
        OrchestratorConfig::default(),
        registry.clone(),
        drafts.clone(),
        vectors.clone(),
        notes.clone(),
        index,
        embedder.clone(),
        backend.clone(),
        publisher.clone(),
    );
    let engine = EvaluationEngine::new(
        EvaluationConfig::default(),
        registry.clone(),
        drafts.clone(),
        notes.clone(),
        evaluations.clone(),
        embedder,
        publisher,
    );

    let mut worker = PipelineWorker::new(
        builder,
        orchestrator,
        engine,
        notes.clone(),
        evaluations.clone(),
    )
    .with_concurrency(4);
    if auto_apply {
        worker = worker.with_auto_apply(BucketReassigner::new(
            registry.clone(),
            transitions.clone(),
        ));
    }

    Fixture {
        worker,
        registry,
        drafts,
        vectors,
        notes,
        evaluations,
        backend,
        transitions,
    }
}

fn recording_fixture(auto_apply: bool) -> (Fixture, Arc<RecordingPublisher>) {
    let publisher = Arc::new(RecordingPublisher::new());
    (
        fixture(publisher.clone(), MockBackend::new(), auto_apply),
        publisher,
    )
}

fn history_updated() -> EventEnvelope {
    EventEnvelope::with_id(
        "evt-history",
        DomainEvent::SpeakerHistoryUpdated {
            speaker_id: "spk".to_string(),
        },
    )
}

fn ingested(event_id: &str, draft: &Draft) -> EventEnvelope {
    EventEnvelope::with_id(
        event_id,
        DomainEvent::DraftIngested {
            speaker_id: draft.speaker_id.clone(),
            draft_id: draft.id.clone(),
            draft_type: draft.draft_type,
            note_key: draft.note_key.clone(),
        },
    )
}

fn ad_3() -> Draft {
    history().remove(4)
}

async fn handle(fx: &Fixture, envelope: EventEnvelope) -> Result<HandleOutcome, PipelineError> {
    fx.worker.handle(envelope, CancellationToken::new()).await
}

async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

#[tokio::test]
async fn test_history_update_builds_vector() {
    let (fx, publisher) = recording_fixture(false);

    let outcome = handle(&fx, history_updated()).await.unwrap();

    assert_eq!(
        outcome,
        HandleOutcome::VectorBuilt {
            speaker_id: "spk".to_string(),
            version: 1,
        }
    );
    assert_eq!(publisher.on_topic(topics::CORRECTION_VECTOR_UPDATED).len(), 1);
}

#[tokio::test]
async fn test_history_update_without_pairs_is_expected() {
    let (fx, _) = recording_fixture(false);

    let err = handle(
        &fx,
        EventEnvelope::new(DomainEvent::SpeakerHistoryUpdated {
            speaker_id: "newbie".to_string(),
        }),
    )
    .await
    .unwrap_err();

    assert!(err.is_expected());
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_candidate_ingest_generates_once_per_event() {
    let (fx, _) = recording_fixture(false);
    handle(&fx, history_updated()).await.unwrap();

    let first = handle(&fx, ingested("evt-ad-3", &ad_3())).await.unwrap();
    let again = handle(&fx, ingested("evt-ad-3", &ad_3())).await.unwrap();

    let HandleOutcome::Generated { dfn_id, status } = &first else {
        panic!("expected a generated DFN, got {first:?}");
    };
    assert_eq!(*status, NoteStatus::Generated);
    assert_eq!(first, again);
    assert_eq!(fx.backend.call_count(), 1);
    assert_eq!(fx.notes.list_for_speaker("spk").await.unwrap().len(), 1);

    let note = fx.notes.get(dfn_id).await.unwrap().unwrap();
    assert_eq!(note.attempt_key, "evt-ad-3");
}

#[tokio::test]
async fn test_generated_dfn_waits_for_ground_truth() {
    let (fx, _) = recording_fixture(false);
    handle(&fx, history_updated()).await.unwrap();
    let HandleOutcome::Generated { dfn_id, .. } =
        handle(&fx, ingested("evt-ad-3", &ad_3())).await.unwrap()
    else {
        panic!("expected a generated DFN");
    };

    let outcome = handle(
        &fx,
        EventEnvelope::new(DomainEvent::DfnGenerated {
            dfn_id: dfn_id.clone(),
            speaker_id: "spk".to_string(),
            status: NoteStatus::Generated,
        }),
    )
    .await
    .unwrap();

    assert!(matches!(outcome, HandleOutcome::Skipped { .. }));
    assert!(fx.evaluations.get(&evaluation_id(&dfn_id)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_final_note_ingest_evaluates_pending_dfns() {
    let (fx, publisher) = recording_fixture(false);
    handle(&fx, history_updated()).await.unwrap();
    let HandleOutcome::Generated { dfn_id, .. } =
        handle(&fx, ingested("evt-ad-3", &ad_3())).await.unwrap()
    else {
        panic!("expected a generated DFN");
    };

    let truth = final_note_n3();
    assert!(fx.drafts.ingest(truth.clone()));
    let outcome = handle(&fx, ingested("evt-ifn-3", &truth)).await.unwrap();

    let expected_id = evaluation_id(&dfn_id);
    assert_eq!(
        outcome,
        HandleOutcome::Evaluated {
            evaluation_ids: vec![expected_id.clone()],
        }
    );
    let evaluation = fx.evaluations.get(&expected_id).await.unwrap().unwrap();
    assert_eq!(evaluation.status, EvaluationStatus::Completed);
    assert_eq!(evaluation.ground_truth_id.as_deref(), Some("ifn-3"));
    assert_eq!(publisher.on_topic(topics::EVALUATION_COMPLETED).len(), 1);

    // Redelivery finds nothing left to evaluate.
    let again = handle(&fx, ingested("evt-ifn-3", &truth)).await.unwrap();
    assert!(matches!(again, HandleOutcome::Skipped { .. }));
    assert_eq!(publisher.on_topic(topics::EVALUATION_COMPLETED).len(), 1);
}

#[tokio::test]
async fn test_dfn_generated_evaluates_when_truth_exists() {
    let (fx, publisher) = recording_fixture(false);
    handle(&fx, history_updated()).await.unwrap();
    assert!(fx.drafts.ingest(final_note_n3()));
    let HandleOutcome::Generated { dfn_id, .. } =
        handle(&fx, ingested("evt-ad-3", &ad_3())).await.unwrap()
    else {
        panic!("expected a generated DFN");
    };

    let outcome = handle(
        &fx,
        EventEnvelope::new(DomainEvent::DfnGenerated {
            dfn_id: dfn_id.clone(),
            speaker_id: "spk".to_string(),
            status: NoteStatus::Generated,
        }),
    )
    .await
    .unwrap();

    assert_eq!(
        outcome,
        HandleOutcome::Evaluated {
            evaluation_ids: vec![evaluation_id(&dfn_id)],
        }
    );
    let proposals = publisher.on_topic(topics::BUCKET_REASSIGNMENT_PROPOSED);
    assert_eq!(
        proposals,
        vec![DomainEvent::BucketReassignmentProposed {
            speaker_id: "spk".to_string(),
            from_bucket: Bucket::Good,
            to_bucket: Bucket::Excellent,
            evaluation_id: evaluation_id(&dfn_id),
        }]
    );
}

#[tokio::test]
async fn test_failed_dfn_is_not_evaluated() {
    let (fx, _) = recording_fixture(false);

    let outcome = handle(
        &fx,
        EventEnvelope::new(DomainEvent::DfnGenerated {
            dfn_id: "dfn-x".to_string(),
            speaker_id: "spk".to_string(),
            status: NoteStatus::Failed,
        }),
    )
    .await
    .unwrap();

    assert!(matches!(outcome, HandleOutcome::Skipped { .. }));
}

fn proposal() -> EventEnvelope {
    EventEnvelope::new(DomainEvent::BucketReassignmentProposed {
        speaker_id: "spk".to_string(),
        from_bucket: Bucket::Good,
        to_bucket: Bucket::Excellent,
        evaluation_id: "eval-1".to_string(),
    })
}

#[tokio::test]
async fn test_proposal_left_alone_without_auto_apply() {
    let (fx, _) = recording_fixture(false);

    let outcome = handle(&fx, proposal()).await.unwrap();

    assert!(matches!(outcome, HandleOutcome::Skipped { .. }));
    let speaker = fx.registry.get_speaker("spk").await.unwrap().unwrap();
    assert_eq!(speaker.bucket, Bucket::Good);
}

#[tokio::test]
async fn test_proposal_applied_with_auto_apply() {
    let (fx, _) = recording_fixture(true);

    let outcome = handle(&fx, proposal()).await.unwrap();
    assert_eq!(
        outcome,
        HandleOutcome::BucketApplied {
            speaker_id: "spk".to_string(),
            from: Bucket::Good,
            to: Bucket::Excellent,
        }
    );
    let speaker = fx.registry.get_speaker("spk").await.unwrap().unwrap();
    assert_eq!(speaker.bucket, Bucket::Excellent);

    // Redelivery returns the recorded transition instead of failing as stale.
    let again = handle(&fx, proposal()).await.unwrap();
    assert_eq!(outcome, again);
    assert_eq!(fx.registry.changes().len(), 1);
}

#[tokio::test]
async fn test_informational_topics_are_skipped() {
    let (fx, _) = recording_fixture(false);

    let outcome = handle(
        &fx,
        EventEnvelope::new(DomainEvent::CorrectionVectorUpdated {
            speaker_id: "spk".to_string(),
            version: 1,
        }),
    )
    .await
    .unwrap();

    assert!(matches!(outcome, HandleOutcome::Skipped { .. }));
}

#[tokio::test]
async fn test_process_releases_speaker_locks() {
    let (fx, _) = recording_fixture(false);

    fx.worker
        .process(history_updated(), CancellationToken::new())
        .await;

    assert_eq!(fx.worker.locked_speaker_count(), 0);
    assert!(fx.vectors.latest("spk").await.unwrap().is_some());
}

#[tokio::test]
async fn test_run_drives_full_flow_over_bus() {
    let (bus, stream) = InProcessBus::new(64);
    let bus = Arc::new(bus);
    let fx = &fixture(bus.clone(), MockBackend::new(), true);
    let shutdown = CancellationToken::new();
    let running = tokio::spawn(fx.worker.clone().run(stream, shutdown.clone()));

    bus.publish(history_updated()).await.unwrap();
    eventually("vector build", move || async move {
        fx.vectors.latest("spk").await.unwrap().is_some()
    })
    .await;

    bus.publish(ingested("evt-ad-3", &ad_3())).await.unwrap();
    eventually("dfn generation", move || async move {
        fx.notes
            .list_for_speaker("spk")
            .await
            .unwrap()
            .iter()
            .any(|n| n.status == NoteStatus::Generated)
    })
    .await;

    let truth = final_note_n3();
    fx.drafts.ingest(truth.clone());
    bus.publish(ingested("evt-ifn-3", &truth)).await.unwrap();

    eventually("bucket transition", move || async move {
        !fx.transitions.history("spk").await.unwrap().is_empty()
    })
    .await;

    let speaker = fx.registry.get_speaker("spk").await.unwrap().unwrap();
    assert_eq!(speaker.bucket, Bucket::Excellent);
    let evaluations = fx.evaluations.list_for_speaker("spk").await.unwrap();
    assert_eq!(evaluations.len(), 1);
    assert_eq!(evaluations[0].status, EvaluationStatus::Completed);

    shutdown.cancel();
    running.await.unwrap();
}

#[tokio::test]
async fn test_busy_speaker_does_not_stall_other_speakers() {
    let (bus, stream) = InProcessBus::new(64);
    let bus = Arc::new(bus);
    let fx = &fixture(
        bus.clone(),
        MockBackend::new().with_delay(Duration::from_secs(5)),
        false,
    );
    handle(fx, history_updated()).await.unwrap();
    for (id, kind, text, secs) in [
        ("newbie-ad-1", DraftType::Asr, "blood presure is stable", 40),
        ("newbie-ifn-1", DraftType::FinalNote, "blood pressure is stable", 45),
    ] {
        let mut d = draft(id, "newbie-n1", kind, text, secs);
        d.speaker_id = "newbie".to_string();
        fx.drafts.ingest(d);
    }

    let shutdown = CancellationToken::new();
    let running = tokio::spawn(fx.worker.clone().run(stream, shutdown.clone()));

    for n in 0..5 {
        bus.publish(ingested(&format!("evt-ad-3-{n}"), &ad_3()))
            .await
            .unwrap();
    }
    eventually("first backend call", move || async move {
        fx.backend.call_count() == 1
    })
    .await;

    let started = std::time::Instant::now();
    bus.publish(EventEnvelope::with_id(
        "evt-newbie-history",
        DomainEvent::SpeakerHistoryUpdated {
            speaker_id: "newbie".to_string(),
        },
    ))
    .await
    .unwrap();
    eventually("newbie vector", move || async move {
        fx.vectors.latest("newbie").await.unwrap().is_some()
    })
    .await;

    assert!(
        started.elapsed() < Duration::from_secs(2),
        "newbie waited {:?} behind spk's backend calls",
        started.elapsed()
    );
    assert_eq!(fx.backend.call_count(), 1);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("worker should stop promptly")
        .unwrap();
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_generation() {
    let (bus, stream) = InProcessBus::new(64);
    let bus = Arc::new(bus);
    let fx = &fixture(
        bus.clone(),
        MockBackend::new().with_delay(Duration::from_secs(30)),
        false,
    );
    handle(fx, history_updated()).await.unwrap();

    let shutdown = CancellationToken::new();
    let running = tokio::spawn(fx.worker.clone().run(stream, shutdown.clone()));

    bus.publish(ingested("evt-ad-3", &ad_3())).await.unwrap();
    eventually("backend call", move || async move { fx.backend.call_count() == 1 }).await;

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("worker should stop promptly")
        .unwrap();

    let notes = fx.notes.list_for_speaker("spk").await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].status, NoteStatus::Failed);
    assert_eq!(
        notes[0].failure.as_ref().map(|f| f.kind),
        Some(FailureKind::Cancelled)
    );
}
