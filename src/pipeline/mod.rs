//! Event-driven pipeline worker.
//!
//! `speaker.history_updated` rebuilds the speaker's correction vector, an ingested
//! AD/LD draft is corrected into a DFN, and a generated DFN is evaluated as soon as
//! its final note exists (either order of arrival works). Proposed bucket changes are
//! applied only when auto-apply is configured.

pub mod error;
pub mod worker;

#[cfg(test)]
mod tests;

pub use error::PipelineError;
pub use worker::{HandleOutcome, PipelineWorker};
