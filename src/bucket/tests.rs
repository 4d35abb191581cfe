use std::sync::Arc;

use super::*;
use crate::registry::{MemorySpeakerRegistry, Speaker, SpeakerRegistry};
use crate::store::MemoryTransitionLog;

#[test]
fn test_default_bands_classify_boundaries() {
    let bands = BucketBands::default();

    assert_eq!(bands.classify(100.0), Bucket::Excellent);
    assert_eq!(bands.classify(90.0), Bucket::Excellent);
    assert_eq!(bands.classify(89.99), Bucket::Good);
    assert_eq!(bands.classify(75.0), Bucket::Good);
    assert_eq!(bands.classify(55.0), Bucket::Average);
    assert_eq!(bands.classify(35.0), Bucket::Poor);
    assert_eq!(bands.classify(34.99), Bucket::NeedsImprovement);
    assert_eq!(bands.classify(0.0), Bucket::NeedsImprovement);
}

#[test]
fn test_classification_is_monotone() {
    let bands = BucketBands::parse("80, 60, 40, 20").unwrap();

    let mut previous = bands.classify(0.0);
    for step in 1..=10_000 {
        let bucket = bands.classify(step as f64 / 100.0);
        assert!(
            bucket.rank() >= previous.rank(),
            "bucket dropped at score {}",
            step as f64 / 100.0
        );
        previous = bucket;
    }
}

#[test]
fn test_bands_parse_rejects_bad_input() {
    assert!(matches!(
        BucketBands::parse("90,75,55"),
        Err(BucketError::InvalidBands { .. })
    ));
    assert!(BucketBands::parse("90,75,x,35").is_err());
    assert!(BucketBands::parse("90,90,55,35").is_err());
    assert!(BucketBands::parse("101,75,55,35").is_err());
    assert!(BucketBands::parse("90,75,55,0").is_err());
    assert_eq!(
        BucketBands::parse("90,75,55,35").unwrap(),
        BucketBands::default()
    );
}

#[test]
fn test_bucket_parse_and_display() {
    for bucket in Bucket::ALL {
        assert_eq!(bucket.to_string().parse::<Bucket>().unwrap(), bucket);
    }
    assert_eq!(
        "needs-improvement".parse::<Bucket>().unwrap(),
        Bucket::NeedsImprovement
    );
    assert!(matches!(
        "SUPERB".parse::<Bucket>(),
        Err(BucketError::UnknownBucket { .. })
    ));
}

fn reassigner(bucket: Bucket) -> (BucketReassigner, Arc<MemorySpeakerRegistry>) {
    let registry = Arc::new(MemorySpeakerRegistry::with_speakers([Speaker::new(
        "spk", bucket,
    )]));
    let log = Arc::new(MemoryTransitionLog::new());
    (BucketReassigner::new(registry.clone(), log), registry)
}

fn proposal(from: Bucket, to: Bucket) -> BucketProposal {
    BucketProposal {
        speaker_id: "spk".to_string(),
        from_bucket: from,
        to_bucket: to,
        evaluation_id: "eval-1".to_string(),
    }
}

#[tokio::test]
async fn test_apply_proposal_updates_registry_and_log() {
    let (reassigner, registry) = reassigner(Bucket::Average);

    let transition = reassigner
        .apply_proposal(&proposal(Bucket::Average, Bucket::Excellent))
        .await
        .unwrap();

    assert_eq!(transition.previous_bucket, Bucket::Average);
    assert_eq!(transition.new_bucket, Bucket::Excellent);
    assert_eq!(transition.reason, TransitionReason::Automatic);
    assert_eq!(transition.evaluation_id.as_deref(), Some("eval-1"));

    let speaker = registry.get_speaker("spk").await.unwrap().unwrap();
    assert_eq!(speaker.bucket, Bucket::Excellent);
    assert_eq!(registry.changes().len(), 1);
    assert_eq!(reassigner.history("spk").await.unwrap(), vec![transition]);
}

#[tokio::test]
async fn test_reapplying_same_proposal_returns_existing_transition() {
    let (reassigner, registry) = reassigner(Bucket::Average);
    let p = proposal(Bucket::Average, Bucket::Good);

    let first = reassigner.apply_proposal(&p).await.unwrap();
    let second = reassigner.apply_proposal(&p).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(registry.changes().len(), 1);
}

#[tokio::test]
async fn test_stale_proposal_rejected() {
    let (reassigner, registry) = reassigner(Bucket::Poor);

    let err = reassigner
        .apply_proposal(&proposal(Bucket::Average, Bucket::Good))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BucketError::StaleProposal {
            expected: Bucket::Average,
            actual: Bucket::Poor,
            ..
        }
    ));
    assert!(registry.changes().is_empty());
    assert!(reassigner.history("spk").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_manual_override() {
    let (reassigner, _registry) = reassigner(Bucket::Good);

    let transition = reassigner
        .apply_override("spk", Bucket::Poor, Some("audit finding".to_string()))
        .await
        .unwrap();
    assert_eq!(transition.reason, TransitionReason::Manual);
    assert_eq!(transition.evaluation_id, None);
    assert_eq!(transition.note.as_deref(), Some("audit finding"));

    let err = reassigner
        .apply_override("spk", Bucket::Poor, None)
        .await
        .unwrap_err();
    assert!(matches!(err, BucketError::NoChange { .. }));

    let err = reassigner
        .apply_override("ghost", Bucket::Poor, None)
        .await
        .unwrap_err();
    assert!(matches!(err, BucketError::Registry(_)));
}
