use super::*;

fn toks(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

#[test]
fn test_single_substitution() {
    let alignment = align_tokens(&toks(&["a", "b", "c"]), &toks(&["a", "x", "c"])).unwrap();

    assert_eq!(
        alignment.ops(),
        &[
            EditOp::Match {
                source: 0,
                target: 0
            },
            EditOp::Substitute {
                source: 1,
                target: 1
            },
            EditOp::Match {
                source: 2,
                target: 2
            },
        ]
    );
    assert_eq!(alignment.distance(), 1);
    assert_eq!(alignment.matches(), 2);
    assert_eq!(alignment.substitutions(), 1);
}

#[test]
fn test_alignment_is_deterministic() {
    let a = toks(&["the", "patient", "the", "has", "has", "pain"]);
    let b = toks(&["patient", "has", "the", "pain", "today"]);

    let first = align_tokens(&a, &b).unwrap();
    let second = align_tokens(&a, &b).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_both_empty_is_perfect_match() {
    let empty: Vec<String> = Vec::new();
    let alignment = align_tokens(&empty, &empty).unwrap();

    assert!(alignment.ops().is_empty());
    assert!(alignment.is_exact());
}

#[test]
fn test_one_side_empty_is_error() {
    let empty: Vec<String> = Vec::new();
    let err = align_tokens(&empty, &toks(&["a", "b"])).unwrap_err();
    assert_eq!(
        err,
        AlignmentError::EmptySequence {
            side: error::AlignmentSide::Source,
            other_len: 2
        }
    );

    assert!(align_tokens(&toks(&["a"]), &empty).is_err());
}

#[test]
fn test_insertion_and_deletion() {
    let inserted = align_tokens(&toks(&["a", "c"]), &toks(&["a", "b", "c"])).unwrap();
    assert_eq!(inserted.insertions(), 1);
    assert_eq!(inserted.distance(), 1);
    assert!(inserted.ops().contains(&EditOp::Insert { target: 1 }));

    let deleted = align_tokens(&toks(&["a", "b", "c"]), &toks(&["a", "c"])).unwrap();
    assert_eq!(deleted.deletions(), 1);
    assert!(deleted.ops().contains(&EditOp::Delete { source: 1 }));
}

#[test]
fn test_tie_prefers_substitution_over_indel() {
    // DEL(x)+SUB(y,z) and SUB(x,z)+DEL(y) both cost 2; the traceback starts at the
    // end and takes SUB first.
    let alignment = align_tokens(&toks(&["x", "y"]), &toks(&["z"])).unwrap();

    assert_eq!(alignment.distance(), 2);
    assert_eq!(alignment.substitutions(), 1);
    assert_eq!(alignment.deletions(), 1);
    assert_eq!(
        alignment.ops(),
        &[
            EditOp::Delete { source: 0 },
            EditOp::Substitute {
                source: 1,
                target: 0
            },
        ]
    );
}

#[test]
fn test_every_token_is_covered_once() {
    let a = toks(&["one", "two", "three", "four"]);
    let b = toks(&["zero", "one", "three", "five", "four", "six"]);
    let alignment = align_tokens(&a, &b).unwrap();

    let sources: Vec<usize> = alignment.ops().iter().filter_map(EditOp::source).collect();
    let targets: Vec<usize> = alignment.ops().iter().filter_map(EditOp::target).collect();

    assert_eq!(sources, (0..a.len()).collect::<Vec<_>>());
    assert_eq!(targets, (0..b.len()).collect::<Vec<_>>());
}

#[test]
fn test_normalization_strips_punctuation_and_folds_case() {
    let policy = NormalizationPolicy::case_folded();
    assert_eq!(
        policy.tokenize("The patient, Mr. O'Neil, has a follow-up!"),
        toks(&["the", "patient", "mr", "o'neil", "has", "a", "follow-up"])
    );
}

#[test]
fn test_case_preserving_policy() {
    let policy = NormalizationPolicy::case_preserving();
    assert_eq!(
        policy.tokenize("taking Metformin daily."),
        toks(&["taking", "Metformin", "daily"])
    );
}

#[test]
fn test_punctuation_only_tokens_are_dropped() {
    let policy = NormalizationPolicy::default();
    assert_eq!(policy.tokenize(" -- ... ! "), Vec::<String>::new());
}

#[test]
fn test_split_sentences() {
    let sentences = split_sentences("Patient stable. Dose 2.5 mg!\nFollow up in two weeks");
    assert_eq!(
        sentences,
        vec!["Patient stable.", "Dose 2.5 mg!", "Follow up in two weeks"]
    );
}

#[test]
fn test_split_sentences_skips_blank() {
    assert!(split_sentences("  ...  \n\n ").is_empty());
}

#[test]
fn test_tokenize_sentences_tracks_membership() {
    let policy = NormalizationPolicy::default();
    let tagged = policy.tokenize_sentences("Hello there. How are you?");

    assert_eq!(tagged.tokens, toks(&["hello", "there", "how", "are", "you"]));
    assert_eq!(tagged.sentence_of, vec![0, 0, 1, 1, 1]);
    assert_eq!(tagged.sentence_count, 2);
}

#[test]
fn test_aligner_align_text_exposes_substitutions() {
    let aligner = TextAligner::new(NormalizationPolicy::case_preserving());
    let aligned = aligner
        .align_text("the patient has diabetis", "the patient has diabetes.")
        .unwrap();

    let subs: Vec<(&str, &str)> = aligned.substitutions().collect();
    assert_eq!(subs, vec![("diabetis", "diabetes")]);
}
