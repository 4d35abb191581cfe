//! Retrieval-augmented generation of draft genie notes (DFNs).
//!
//! For a source draft the orchestrator retrieves the speaker's correction vector (or
//! borrows the nearest one on cold start), assembles a deterministic prompt from the
//! top rules and recent history, calls the generative backend under a hard timeout,
//! and records the outcome as an immutable DFN.

pub mod backend;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod model;
pub mod orchestrator;
pub mod prompt;


pub use backend::{GenaiBackend, GenerativeBackend};
pub use error::{BackendError, RagError};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockBackend;
pub use model::{
    DraftGenieNote, FailureKind, GenerationFailure, GenerationStage, NoteProvenance, NoteStatus,
    PromptRecord, PromptStorage, VectorRef,
};
pub use orchestrator::{Attempt, GenerationRequest, OrchestratorConfig, RagOrchestrator};
pub use prompt::{FewShotExample, assemble_prompt};
