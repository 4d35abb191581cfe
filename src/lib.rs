//! draft-genie library crate (used by the `genie` binary and integration tests).
//!
//! Learns each speaker's recurring corrections from (draft, final note) pairs, uses
//! them to correct new drafts through a generative backend, and scores the results
//! against the final note once it arrives.
//!
//! # Public API Surface
//!
//! ## Core
//! - [`TextAligner`] - word-level alignment (MATCH/SUB/INS/DEL)
//! - [`CorrectionVectorBuilder`] - per-speaker versioned correction vectors
//! - [`RagOrchestrator`] - retrieval-augmented generation of draft genie notes
//! - [`EvaluationEngine`] - SER/WER/similarity scoring and bucket recommendation
//! - [`BucketReassigner`] - applies bucket proposals and manual overrides
//!
//! ## Service
//! - [`PipelineWorker`] - event-driven orchestration of the stages above
//! - [`gateway`] - probes and event ingress over HTTP
//! - [`Config`], [`ConfigError`] - environment configuration
//!
//! ## Ports and Adapters
//! Collaborators are async traits ([`SpeakerRegistry`], [`DraftStore`],
//! [`VectorIndex`], [`GenerativeBackend`], [`EventPublisher`] and the record stores in
//! [`store`]) with HTTP, filesystem, Qdrant and `genai` implementations.
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod bucket;
pub mod config;
pub mod constants;
pub mod drafts;
pub mod embedding;
pub mod evaluation;
pub mod events;
pub mod gateway;
pub mod hashing;
pub mod pipeline;
pub mod rag;
pub mod registry;
pub mod store;
pub mod text;
pub mod vector;
pub mod vectordb;

pub use bucket::{Bucket, BucketBands, BucketError, BucketReassigner, BucketTransition};
pub use config::{Config, ConfigError};
pub use drafts::{Draft, DraftStore, DraftStoreError, DraftType};
pub use embedding::{EmbeddingError, HashingEmbedder, TextEmbedder};
pub use evaluation::{Evaluation, EvaluationEngine, EvaluationError, EvaluationStatus};
pub use events::{DomainEvent, EventEnvelope, EventPublisher, EventStream, InProcessBus};
pub use hashing::{dfn_id, evaluation_id, prompt_digest};
pub use pipeline::{HandleOutcome, PipelineError, PipelineWorker};
pub use rag::{
    BackendError, DraftGenieNote, GenerationRequest, GenerativeBackend, NoteStatus, RagError,
    RagOrchestrator,
};
pub use registry::{RegistryError, Speaker, SpeakerRegistry, SpeakerStatus};
pub use store::StoreError;
pub use text::{AlignedText, AlignmentError, EditOp, NormalizationPolicy, TextAligner};
pub use vector::{CorrectionRule, CorrectionVector, CorrectionVectorBuilder, VectorBuildError};
pub use vectordb::{VectorDbError, VectorIndex};

#[cfg(any(test, feature = "mock"))]
pub use events::RecordingPublisher;
#[cfg(any(test, feature = "mock"))]
pub use rag::MockBackend;
#[cfg(any(test, feature = "mock"))]
pub use vectordb::MockVectorIndex;
