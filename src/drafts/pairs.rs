use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Draft, DraftType};

/// A candidate draft (AD or LD) joined with its ground-truth final note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftPair {
    pub draft: Draft,
    pub ground_truth: Draft,
}

impl DraftPair {
    /// Stable identity used for provenance and build fingerprints.
    pub fn key(&self) -> String {
        pair_key(&self.draft.id, &self.ground_truth.id)
    }
}

pub(crate) fn pair_key(draft_id: &str, ground_truth_id: &str) -> String {
    format!("{draft_id}:{ground_truth_id}")
}

/// Joins candidate drafts with the latest final note sharing their `note_key`.
///
/// Candidates without a final note are skipped. Pairs come back ordered by the final
/// note's creation time, then the candidate's, so the tail holds the most recent ones.
pub fn pair_history(drafts: &[Draft]) -> Vec<DraftPair> {
    let mut ground_truth: HashMap<&str, &Draft> = HashMap::new();
    for draft in drafts.iter().filter(|d| d.draft_type == DraftType::FinalNote) {
        let newer = ground_truth.get(draft.note_key.as_str()).is_none_or(|existing| {
            (draft.created_at, &draft.id) > (existing.created_at, &existing.id)
        });
        if newer {
            ground_truth.insert(draft.note_key.as_str(), draft);
        }
    }

    let mut pairs: Vec<DraftPair> = drafts
        .iter()
        .filter(|d| d.draft_type.is_candidate())
        .filter_map(|candidate| {
            ground_truth
                .get(candidate.note_key.as_str())
                .filter(|truth| truth.speaker_id == candidate.speaker_id)
                .map(|truth| DraftPair {
                    draft: candidate.clone(),
                    ground_truth: (*truth).clone(),
                })
        })
        .collect();

    pairs.sort_by(|a, b| {
        (a.ground_truth.created_at, a.draft.created_at, &a.draft.id).cmp(&(
            b.ground_truth.created_at,
            b.draft.created_at,
            &b.draft.id,
        ))
    });
    pairs
}
