//! Word-level text alignment.
//!
//! [`TextAligner`] tokenizes both sides with one [`NormalizationPolicy`] and computes a
//! minimal token-level Levenshtein alignment. The same aligner feeds correction-rule
//! extraction ([`crate::vector`]) and edit-rate metrics ([`crate::evaluation`]).

pub mod align;
pub mod error;
pub mod normalize;

#[cfg(test)]
mod tests;

pub use align::{AlignedText, EditOp, TextAligner, TokenAlignment, align_tokens};
pub use error::AlignmentError;
pub use normalize::{NormalizationPolicy, SentenceTokens, normalize_token, split_sentences};
