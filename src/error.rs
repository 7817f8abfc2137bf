//! Failure taxonomy for the research pipeline.
//!
//! Adapter and chunk-level failures are recoverable and get absorbed into
//! annotations; only index unavailability and invalid goals abort a run.

use std::time::Duration;
use thiserror::Error;

/// A source adapter call failed. Recoverable: the collector records the
/// failure against the subtopic and continues with the other sources.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("source timed out after {0:?}")]
    Timeout(Duration),
}

/// An embedding batch failed. Recoverable at chunk granularity: the
/// processor drops the affected chunks and continues.
#[derive(Debug, Error)]
#[error("embedding failed: {0}")]
pub struct EmbeddingError(pub String);

/// The vector index could not be reached or refused an operation.
/// Fatal to the current pipeline run.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index unavailable during {operation} for '{context}': {message}")]
    Unavailable {
        operation: &'static str,
        context: String,
        message: String,
    },
}

impl IndexError {
    pub fn unavailable(
        operation: &'static str,
        context: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Unavailable {
            operation,
            context: context.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced to callers of the pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Boundary validation failed; the pipeline never started.
    #[error("invalid goal: {0}")]
    InvalidGoal(String),

    #[error(transparent)]
    Index(#[from] IndexError),

    /// Embedding the user's search query failed. Only raised by ad-hoc
    /// index search; during a pipeline run embedding failures are absorbed
    /// at chunk granularity instead.
    #[error(transparent)]
    QueryEmbedding(#[from] EmbeddingError),
}
