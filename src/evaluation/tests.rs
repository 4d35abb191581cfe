use std::sync::Arc;

use chrono::{TimeZone, Utc};

use super::*;
use crate::bucket::Bucket;
use crate::drafts::{Draft, DraftType, MemoryDraftStore};
use crate::embedding::HashingEmbedder;
use crate::events::{DomainEvent, RecordingPublisher, topics};
use crate::hashing::evaluation_id;
use crate::rag::{DraftGenieNote, NoteProvenance, NoteStatus};
use crate::registry::{MemorySpeakerRegistry, Speaker};
use crate::store::{EvaluationStore, MemoryEvaluationStore, MemoryNoteStore, NoteStore};
use crate::text::{AlignmentError, NormalizationPolicy};

const TRUTH: &str = "Patient has diabetes. Continue Metformin 500 mg twice daily.";

fn final_note(id: &str, key: &str, text: &str) -> Draft {
    Draft {
        id: id.to_string(),
        speaker_id: "spk".to_string(),
        note_key: key.to_string(),
        draft_type: DraftType::FinalNote,
        text: text.to_string(),
        created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    }
}

fn note(id: &str, key: &str, status: NoteStatus, text: Option<&str>) -> DraftGenieNote {
    DraftGenieNote {
        id: id.to_string(),
        speaker_id: "spk".to_string(),
        source_draft_id: format!("ad-{key}"),
        note_key: key.to_string(),
        vector_version: 1,
        attempt_key: "attempt-1".to_string(),
        status,
        prompt: None,
        generated_text: text.map(str::to_string),
        provenance: NoteProvenance::default(),
        failure: None,
        created_at: Utc::now(),
        completed_at: Some(Utc::now()),
    }
}

struct Fixture {
    engine: EvaluationEngine,
    notes: Arc<MemoryNoteStore>,
    evaluations: Arc<MemoryEvaluationStore>,
    publisher: Arc<RecordingPublisher>,
}

fn fixture(bucket: Bucket) -> Fixture {
    let registry = Arc::new(MemorySpeakerRegistry::with_speakers([Speaker::new(
        "spk", bucket,
    )]));
    let drafts = Arc::new(MemoryDraftStore::with_drafts([
        final_note("ifn-1", "n1", TRUTH),
        final_note("ifn-blank", "blank", "..."),
    ]));
    let notes = Arc::new(MemoryNoteStore::new());
    let evaluations = Arc::new(MemoryEvaluationStore::new());
    let publisher = Arc::new(RecordingPublisher::new());

    let engine = EvaluationEngine::new(
        EvaluationConfig::default(),
        registry,
        drafts,
        notes.clone(),
        evaluations.clone(),
        Arc::new(HashingEmbedder::default()),
        publisher.clone(),
    );
    Fixture {
        engine,
        notes,
        evaluations,
        publisher,
    }
}

#[test]
fn test_identical_texts_score_perfectly() {
    let rates = edit_rates(TRUTH, TRUTH, NormalizationPolicy::case_folded()).unwrap();
    assert_eq!(rates.ser, 0.0);
    assert_eq!(rates.wer, 0.0);
    assert_eq!(rates.counts.reference_sentences, 2);
    assert_eq!(rates.counts.reference_words, 9);

    let embedder = HashingEmbedder::default();
    let similarity =
        semantic_similarity(&embedder, TRUTH, TRUTH, NormalizationPolicy::case_folded()).unwrap();
    assert_eq!(similarity, 1.0);

    let score = QualityWeights::default().quality_score(rates.ser, rates.wer, similarity);
    assert_eq!(score, 100.0);
}

#[test]
fn test_substitution_counts_against_its_sentence() {
    let rates = edit_rates(
        "The patient is stable. Continue insulin.",
        "The patient is stable. Continue metformin.",
        NormalizationPolicy::case_folded(),
    )
    .unwrap();

    assert_eq!(rates.counts.substitutions, 1);
    assert_eq!(rates.counts.sentences_with_edits, 1);
    assert_eq!(rates.ser, 0.5);
    assert_eq!(rates.wer, 1.0 / 6.0);
}

#[test]
fn test_extra_word_counts_against_preceding_sentence() {
    let policy = NormalizationPolicy::case_folded();
    let reference = "The patient is stable. Continue metformin.";

    let middle = edit_rates("The patient is very stable. Continue metformin.", reference, policy)
        .unwrap();
    assert_eq!(middle.counts.edits(), 1);
    assert_eq!(middle.ser, 0.5);

    let leading = edit_rates("Okay the patient is stable. Continue metformin.", reference, policy)
        .unwrap();
    assert_eq!(leading.counts.sentences_with_edits, 1);
    assert_eq!(leading.ser, 0.5);

    let missing = edit_rates("The patient is stable. Continue.", reference, policy).unwrap();
    assert_eq!(missing.counts.edits(), 1);
    assert_eq!(missing.ser, 0.5);
}

#[test]
fn test_case_and_punctuation_are_not_edits() {
    let rates = edit_rates(
        "patient has diabetes continue metformin 500 mg twice daily",
        TRUTH,
        NormalizationPolicy::case_folded(),
    )
    .unwrap();
    assert_eq!(rates.wer, 0.0);
}

#[test]
fn test_both_empty_is_a_perfect_match() {
    let policy = NormalizationPolicy::case_folded();
    let rates = edit_rates("", "  ", policy).unwrap();
    assert_eq!((rates.ser, rates.wer), (0.0, 0.0));

    let similarity = semantic_similarity(&HashingEmbedder::default(), "", "", policy).unwrap();
    assert_eq!(similarity, 1.0);
}

#[test]
fn test_one_side_empty_fails_alignment() {
    assert!(edit_rates("something", "", NormalizationPolicy::case_folded()).is_err());
    assert!(matches!(
        edit_rates("...", "something else", NormalizationPolicy::case_folded()),
        Err(AlignmentError::EmptySequence { other_len: 2, .. })
    ));
}

#[test]
fn test_quality_weights() {
    let weights = QualityWeights::default();
    assert_eq!(weights.quality_score(0.5, 0.25, 0.8), 72.0);
    assert_eq!(weights.quality_score(1.0, 3.0, 0.0), 0.0);

    assert!(weights.validate().is_ok());
    let negative = QualityWeights {
        wer: -0.1,
        ..weights
    };
    assert!(negative.validate().is_err());
    let zero = QualityWeights {
        wer: 0.0,
        similarity: 0.0,
        ser: 0.0,
    };
    assert!(zero.validate().is_err());

    let unnormalized = QualityWeights {
        wer: 2.0,
        similarity: 2.0,
        ser: 1.0,
    };
    assert_eq!(unnormalized.quality_score(0.5, 0.25, 0.8), 72.0);
}

#[tokio::test]
async fn test_evaluate_identical_note_proposes_upgrade() {
    let fx = fixture(Bucket::Good);
    fx.notes
        .insert_pending(&note("dfn-1", "n1", NoteStatus::Generated, Some(TRUTH)))
        .await
        .unwrap();

    let evaluation = fx.engine.evaluate("dfn-1").await.unwrap();

    assert_eq!(evaluation.id, evaluation_id("dfn-1"));
    assert_eq!(evaluation.status, EvaluationStatus::Completed);
    assert_eq!(evaluation.ground_truth_id.as_deref(), Some("ifn-1"));
    let scores = evaluation.scores.as_ref().unwrap();
    assert_eq!(scores.ser, 0.0);
    assert_eq!(scores.wer, 0.0);
    assert_eq!(scores.similarity, 1.0);
    assert_eq!(scores.quality_score, 100.0);
    assert_eq!(scores.recommended_bucket, Bucket::Excellent);
    assert_eq!(evaluation.speaker_bucket, Some(Bucket::Good));
    assert!(evaluation.reassignment_proposed);

    assert_eq!(
        fx.publisher.on_topic(topics::EVALUATION_COMPLETED),
        vec![DomainEvent::EvaluationCompleted {
            evaluation_id: evaluation.id.clone(),
            dfn_id: "dfn-1".to_string(),
            quality_score: 100.0,
            recommended_bucket: Bucket::Excellent,
        }]
    );
    assert_eq!(
        fx.publisher.on_topic(topics::BUCKET_REASSIGNMENT_PROPOSED),
        vec![DomainEvent::BucketReassignmentProposed {
            speaker_id: "spk".to_string(),
            from_bucket: Bucket::Good,
            to_bucket: Bucket::Excellent,
            evaluation_id: evaluation.id.clone(),
        }]
    );
}

#[tokio::test]
async fn test_matching_bucket_proposes_nothing() {
    let fx = fixture(Bucket::Excellent);
    fx.notes
        .insert_pending(&note("dfn-1", "n1", NoteStatus::Generated, Some(TRUTH)))
        .await
        .unwrap();

    let evaluation = fx.engine.evaluate("dfn-1").await.unwrap();

    assert!(!evaluation.reassignment_proposed);
    assert!(evaluation.proposal().is_none());
    assert!(
        fx.publisher
            .on_topic(topics::BUCKET_REASSIGNMENT_PROPOSED)
            .is_empty()
    );
}

#[tokio::test]
async fn test_poor_note_lands_in_lower_bucket() {
    let fx = fixture(Bucket::Good);
    fx.notes
        .insert_pending(&note(
            "dfn-1",
            "n1",
            NoteStatus::Generated,
            Some("Patient has diabetis. Continue metforman 50 mg once."),
        ))
        .await
        .unwrap();

    let evaluation = fx.engine.evaluate("dfn-1").await.unwrap();

    let scores = evaluation.scores.unwrap();
    assert_eq!(scores.ser, 1.0);
    assert!(scores.wer > 0.3);
    assert!(scores.quality_score < 75.0);
    assert!(scores.recommended_bucket.rank() < Bucket::Good.rank());
}

#[tokio::test]
async fn test_reevaluation_returns_stored_record() {
    let fx = fixture(Bucket::Good);
    fx.notes
        .insert_pending(&note("dfn-1", "n1", NoteStatus::Generated, Some(TRUTH)))
        .await
        .unwrap();

    let first = fx.engine.evaluate("dfn-1").await.unwrap();
    let second = fx.engine.evaluate("dfn-1").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(fx.evaluations.len(), 1);
    assert_eq!(fx.publisher.on_topic(topics::EVALUATION_COMPLETED).len(), 1);
}

#[tokio::test]
async fn test_missing_ground_truth_writes_nothing() {
    let fx = fixture(Bucket::Good);
    fx.notes
        .insert_pending(&note("dfn-2", "n2", NoteStatus::Generated, Some(TRUTH)))
        .await
        .unwrap();

    let err = fx.engine.evaluate("dfn-2").await.unwrap_err();

    assert!(matches!(err, EvaluationError::GroundTruthUnavailable { .. }));
    assert!(!err.is_retryable());
    assert!(fx.evaluations.is_empty());
    assert!(fx.publisher.events().is_empty());
}

#[tokio::test]
async fn test_unknown_dfn_is_an_error() {
    let fx = fixture(Bucket::Good);
    let err = fx.engine.evaluate("nope").await.unwrap_err();
    assert!(matches!(err, EvaluationError::UnknownDfn { .. }));
}

#[tokio::test]
async fn test_failed_dfn_yields_failed_evaluation() {
    let fx = fixture(Bucket::Good);
    fx.notes
        .insert_pending(&note("dfn-1", "n1", NoteStatus::Failed, None))
        .await
        .unwrap();

    let evaluation = fx.engine.evaluate("dfn-1").await.unwrap();

    assert_eq!(evaluation.status, EvaluationStatus::Failed);
    assert!(evaluation.scores.is_none());
    assert!(evaluation.failure_reason.unwrap().contains("not GENERATED"));
    assert!(fx.publisher.events().is_empty());

    let stored = fx.evaluations.get(&evaluation_id("dfn-1")).await.unwrap();
    assert_eq!(stored.unwrap().status, EvaluationStatus::Failed);
}

#[tokio::test]
async fn test_unalignable_pair_yields_failed_evaluation() {
    let fx = fixture(Bucket::Good);
    fx.notes
        .insert_pending(&note("dfn-1", "blank", NoteStatus::Generated, Some(TRUTH)))
        .await
        .unwrap();

    let evaluation = fx.engine.evaluate("dfn-1").await.unwrap();

    assert_eq!(evaluation.status, EvaluationStatus::Failed);
    assert!(
        evaluation
            .failure_reason
            .unwrap()
            .starts_with("alignment failed")
    );
}

#[tokio::test]
async fn test_empty_generated_text_fails_instead_of_scoring() {
    let fx = fixture(Bucket::Good);
    fx.notes
        .insert_pending(&note("dfn-1", "n1", NoteStatus::Generated, Some(" ... ")))
        .await
        .unwrap();

    let evaluation = fx.engine.evaluate("dfn-1").await.unwrap();

    assert_eq!(evaluation.status, EvaluationStatus::Failed);
    assert!(evaluation.scores.is_none());
    assert!(
        evaluation
            .failure_reason
            .unwrap()
            .starts_with("alignment failed")
    );
    assert!(
        fx.publisher
            .on_topic(topics::BUCKET_REASSIGNMENT_PROPOSED)
            .is_empty()
    );
}

#[test]
fn test_evaluation_status_transitions() {
    use EvaluationStatus::*;
    assert!(Pending.can_advance_to(InProgress));
    assert!(InProgress.can_advance_to(Completed));
    assert!(InProgress.can_advance_to(Failed));
    assert!(!Completed.can_advance_to(Failed));
    assert!(!Failed.can_advance_to(InProgress));
}
