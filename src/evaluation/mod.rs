//! Evaluation of generated notes against ground truth.
//!
//! A DFN is aligned word by word against the final note (case-folded) to get SER and
//! WER, embedded for semantic similarity, and the weighted combination is mapped onto
//! a bucket. A recommended bucket that differs from the speaker's current one is
//! published as a proposal; applying it is [`crate::bucket::BucketReassigner`]'s job.

pub mod engine;
pub mod error;
pub mod metrics;
pub mod model;

#[cfg(test)]
mod tests;

pub use engine::{EvaluationConfig, EvaluationEngine};
pub use error::EvaluationError;
pub use metrics::{EditRates, QualityWeights, edit_rates, semantic_similarity};
pub use model::{EditCounts, Evaluation, EvaluationScores, EvaluationStatus};
