//! Token-level Levenshtein alignment with deterministic tie-breaking.

use super::error::{AlignmentError, AlignmentSide};
use super::normalize::NormalizationPolicy;

/// One step of an alignment. Indices point into the source/target token slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditOp {
    Match { source: usize, target: usize },
    Substitute { source: usize, target: usize },
    /// Token present in the target but missing from the source.
    Insert { target: usize },
    /// Token present in the source but absent from the target.
    Delete { source: usize },
}

impl EditOp {
    #[inline]
    pub fn is_edit(&self) -> bool {
        !matches!(self, EditOp::Match { .. })
    }

    #[inline]
    pub fn source(&self) -> Option<usize> {
        match *self {
            EditOp::Match { source, .. }
            | EditOp::Substitute { source, .. }
            | EditOp::Delete { source } => Some(source),
            EditOp::Insert { .. } => None,
        }
    }

    #[inline]
    pub fn target(&self) -> Option<usize> {
        match *self {
            EditOp::Match { target, .. }
            | EditOp::Substitute { target, .. }
            | EditOp::Insert { target } => Some(target),
            EditOp::Delete { .. } => None,
        }
    }
}

/// Ordered edit operations plus their tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenAlignment {
    ops: Vec<EditOp>,
    matches: usize,
    substitutions: usize,
    insertions: usize,
    deletions: usize,
}

impl TokenAlignment {
    fn from_ops(ops: Vec<EditOp>) -> Self {
        let mut alignment = Self {
            ops,
            ..Default::default()
        };
        for op in &alignment.ops {
            match op {
                EditOp::Match { .. } => alignment.matches += 1,
                EditOp::Substitute { .. } => alignment.substitutions += 1,
                EditOp::Insert { .. } => alignment.insertions += 1,
                EditOp::Delete { .. } => alignment.deletions += 1,
            }
        }
        alignment
    }

    pub fn ops(&self) -> &[EditOp] {
        &self.ops
    }

    pub fn matches(&self) -> usize {
        self.matches
    }

    pub fn substitutions(&self) -> usize {
        self.substitutions
    }

    pub fn insertions(&self) -> usize {
        self.insertions
    }

    pub fn deletions(&self) -> usize {
        self.deletions
    }

    /// Levenshtein distance (S + I + D).
    pub fn distance(&self) -> usize {
        self.substitutions + self.insertions + self.deletions
    }

    pub fn is_exact(&self) -> bool {
        self.distance() == 0
    }
}

/// Computes the minimal token alignment from `source` to `target`.
///
/// Costs are 1 for substitution, insertion and deletion, 0 for a match. When several
/// paths share the minimal cost the traceback prefers MATCH, then SUB, then DEL, then
/// INS, so the output is reproducible. Both sides empty is a perfect match with no
/// operations; exactly one side empty is an [`AlignmentError`].
pub fn align_tokens<S: AsRef<str>>(
    source: &[S],
    target: &[S],
) -> Result<TokenAlignment, AlignmentError> {
    let n = source.len();
    let m = target.len();

    match (n, m) {
        (0, 0) => return Ok(TokenAlignment::default()),
        (0, _) => {
            return Err(AlignmentError::EmptySequence {
                side: AlignmentSide::Source,
                other_len: m,
            });
        }
        (_, 0) => {
            return Err(AlignmentError::EmptySequence {
                side: AlignmentSide::Target,
                other_len: n,
            });
        }
        _ => {}
    }

    let width = m + 1;
    let mut dist = vec![0u32; (n + 1) * width];
    for i in 0..=n {
        dist[i * width] = i as u32;
    }
    for j in 0..=m {
        dist[j] = j as u32;
    }

    for i in 1..=n {
        for j in 1..=m {
            let same = source[i - 1].as_ref() == target[j - 1].as_ref();
            let diag = dist[(i - 1) * width + (j - 1)] + u32::from(!same);
            let up = dist[(i - 1) * width + j] + 1;
            let left = dist[i * width + (j - 1)] + 1;
            dist[i * width + j] = diag.min(up).min(left);
        }
    }

    let mut ops = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        let here = dist[i * width + j];

        if i > 0 && j > 0 {
            let diag = dist[(i - 1) * width + (j - 1)];
            let same = source[i - 1].as_ref() == target[j - 1].as_ref();
            if same && here == diag {
                ops.push(EditOp::Match {
                    source: i - 1,
                    target: j - 1,
                });
                i -= 1;
                j -= 1;
                continue;
            }
            if !same && here == diag + 1 {
                ops.push(EditOp::Substitute {
                    source: i - 1,
                    target: j - 1,
                });
                i -= 1;
                j -= 1;
                continue;
            }
        }

        if i > 0 && here == dist[(i - 1) * width + j] + 1 {
            ops.push(EditOp::Delete { source: i - 1 });
            i -= 1;
        } else {
            ops.push(EditOp::Insert { target: j - 1 });
            j -= 1;
        }
    }

    ops.reverse();
    Ok(TokenAlignment::from_ops(ops))
}

/// Alignment together with the normalized tokens it indexes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedText {
    pub source_tokens: Vec<String>,
    pub target_tokens: Vec<String>,
    pub alignment: TokenAlignment,
}

impl AlignedText {
    /// Iterates `(source_token, target_token)` for every substitution.
    pub fn substitutions(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.alignment.ops().iter().filter_map(|op| match *op {
            EditOp::Substitute { source, target } => Some((
                self.source_tokens[source].as_str(),
                self.target_tokens[target].as_str(),
            )),
            _ => None,
        })
    }
}

/// Tokenizes and aligns text under one [`NormalizationPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TextAligner {
    policy: NormalizationPolicy,
}

impl TextAligner {
    pub fn new(policy: NormalizationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> NormalizationPolicy {
        self.policy
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.policy.tokenize(text)
    }

    /// Aligns already-normalized token sequences.
    pub fn align(
        &self,
        source: &[String],
        target: &[String],
    ) -> Result<TokenAlignment, AlignmentError> {
        align_tokens(source, target)
    }

    /// Normalizes both texts with this aligner's policy and aligns them.
    pub fn align_text(&self, source: &str, target: &str) -> Result<AlignedText, AlignmentError> {
        let source_tokens = self.tokenize(source);
        let target_tokens = self.tokenize(target);
        let alignment = align_tokens(&source_tokens, &target_tokens)?;

        Ok(AlignedText {
            source_tokens,
            target_tokens,
            alignment,
        })
    }
}
