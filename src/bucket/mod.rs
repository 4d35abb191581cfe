//! Speaker quality buckets.
//!
//! Evaluation only *proposes* a bucket change; [`BucketReassigner`] is the separate,
//! explicit step that writes it to the registry and the transition log.

pub mod error;
pub mod reassign;
pub mod types;

#[cfg(test)]
mod tests;

pub use error::BucketError;
pub use reassign::BucketReassigner;
pub use types::{Bucket, BucketBands, BucketProposal, BucketTransition, TransitionReason};
