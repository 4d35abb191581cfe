//! Per-speaker correction vectors.
//!
//! A vector is the rule set learned from aligning a speaker's drafts against their
//! final notes, plus an embedding of that rule set for cross-speaker lookup.

pub mod builder;
pub mod error;
pub mod extract;
pub mod model;


pub use builder::{BuilderConfig, CorrectionVectorBuilder};
pub use error::VectorBuildError;
pub use extract::extract_rules;
pub use model::{CorrectionRule, CorrectionVector, PairRef};
