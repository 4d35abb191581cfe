use thiserror::Error;

/// Which side of an alignment an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentSide {
    Source,
    Target,
}

impl std::fmt::Display for AlignmentSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlignmentSide::Source => f.write_str("source"),
            AlignmentSide::Target => f.write_str("target"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlignmentError {
    /// One side normalized to zero tokens while the other did not.
    #[error("cannot align: {side} sequence is empty while the other has {other_len} tokens")]
    EmptySequence {
        side: AlignmentSide,
        other_len: usize,
    },
}
