use thiserror::Error;

use crate::bucket::BucketError;
use crate::evaluation::EvaluationError;
use crate::rag::RagError;
use crate::store::StoreError;
use crate::vector::VectorBuildError;

/// Failure while handling one event.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("vector build failed: {0}")]
    Vector(#[from] VectorBuildError),

    #[error("generation failed: {0}")]
    Generation(#[from] RagError),

    #[error("evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("bucket reassignment failed: {0}")]
    Bucket(#[from] BucketError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Vector(e) => e.is_retryable(),
            PipelineError::Generation(e) => e.is_retryable(),
            PipelineError::Evaluation(e) => e.is_retryable(),
            PipelineError::Bucket(BucketError::Registry(e)) => e.is_retryable(),
            PipelineError::Bucket(BucketError::Store(e)) | PipelineError::Store(e) => {
                e.is_retryable()
            }
            PipelineError::Bucket(_) => false,
        }
    }

    /// Outcomes that are normal in a healthy pipeline and only worth a debug line.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            PipelineError::Vector(VectorBuildError::InsufficientHistory { .. })
                | PipelineError::Evaluation(EvaluationError::GroundTruthUnavailable { .. })
                | PipelineError::Bucket(
                    BucketError::StaleProposal { .. } | BucketError::NoChange { .. }
                )
        )
    }
}
